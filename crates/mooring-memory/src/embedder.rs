//! Embedding provider seam
//!
//! An embedder is optional. Without one, recall falls back to keyword
//! overlap; nothing errors.

use async_trait::async_trait;
use mooring_core::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Turns text into a fixed-length vector for semantic comparison
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; default is one call per text
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimensionality of vectors this embedder produces
    fn dimensions(&self) -> usize;

    /// Name of the underlying model
    fn model_name(&self) -> &str;
}

/// Deterministic embedder for tests
///
/// Hashes each whitespace term into a bucket and normalizes, so texts
/// that share terms get a meaningfully high cosine similarity without
/// any model. Not semantic in any real sense.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dimensions: 64 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");
        Self { dimensions }
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in text.to_lowercase().split_whitespace() {
            vector[self.bucket(term)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-term-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed("fix the parser").await.unwrap();
        let b = embedder.embed("fix the parser").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_terms_score_higher() {
        let embedder = MockEmbedder::new();
        let query = embedder.embed("parser error handling").await.unwrap();
        let related = embedder.embed("the parser error was fixed").await.unwrap();
        let unrelated = embedder.embed("database migration script").await.unwrap();

        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated),
            "shared-term text should score higher"
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = MockEmbedder::new();
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(v.len(), 64);
    }
}
