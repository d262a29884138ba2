//! Relevance scoring
//!
//! Recall scores an item against a query with cosine similarity when
//! both sides have embeddings, and falls back to keyword overlap when
//! either side lacks one.

/// Cosine similarity between two vectors
///
/// Returns 0.0 for mismatched dimensions or a zero vector, so callers
/// never divide by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Keyword overlap between a query and a piece of content
///
/// The fraction of query terms longer than 2 characters that appear
/// as a case-insensitive substring of the content. A query with no
/// qualifying terms scores 0.0.
pub fn keyword_overlap(query: &str, content: &str) -> f64 {
    let content_lower = content.to_lowercase();
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect();

    if terms.is_empty() {
        return 0.0;
    }

    let hits = terms
        .iter()
        .filter(|t| content_lower.contains(t.as_str()))
        .count();

    hits as f64 / terms.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_keyword_overlap_partial() {
        // One of three qualifying terms appears in the content
        let score = keyword_overlap("database connection pooling", "the connection timed out");
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_overlap_case_insensitive() {
        assert_eq!(keyword_overlap("CMake", "the build uses cmake"), 1.0);
    }

    #[test]
    fn test_keyword_overlap_short_terms_ignored() {
        // Every term is 2 characters or fewer
        assert_eq!(keyword_overlap("a an of", "a an of"), 0.0);
    }

    #[test]
    fn test_keyword_overlap_empty_query() {
        assert_eq!(keyword_overlap("", "anything"), 0.0);
    }
}
