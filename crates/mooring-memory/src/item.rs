//! Memory items
//!
//! A memory item is one remembered fact, message, or decision, living
//! in exactly one tier at a time. Tier moves, accesses, and relevance
//! updates mutate the item in place; deletion is explicit or via the
//! cold-tier prune.

use chrono::{DateTime, Utc};
use mooring_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a memory item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryItemId(String);

impl MemoryItemId {
    /// Create a new unique item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MemoryItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of fact an item records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A conversation message
    Message,
    /// A standalone fact about the project or task
    Fact,
    /// A decision the agent committed to
    Decision,
    /// A code entity (function, type, file)
    Entity,
    /// Ambient context that frames other items
    Context,
}

/// Storage tier of a memory item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// In the active working set, counted against the token budget
    Hot,
    /// Recently useful, first candidate for recall
    Warm,
    /// Rarely used, bounded by item count and subject to pruning
    Cold,
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        };
        write!(f, "{}", label)
    }
}

/// Estimate the token count of a piece of content
///
/// Rough chars/4 heuristic, rounded up. Good enough for budget
/// enforcement; never used for billing.
pub fn estimate_tokens(content: &str) -> usize {
    (content.len() + 3) / 4
}

/// A single remembered item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier
    pub id: MemoryItemId,
    /// Owning session
    pub session_id: SessionId,
    /// The remembered text
    pub content: String,
    /// What kind of fact this is
    pub kind: MemoryKind,
    /// Current tier
    pub tier: MemoryTier,
    /// Times this item was returned by recall
    pub access_count: u64,
    /// When the item was last returned by recall
    pub last_accessed_at: DateTime<Utc>,
    /// When the item was created
    pub created_at: DateTime<Utc>,
    /// Demonstrated usefulness, 0..1
    pub relevance_score: f64,
    /// Estimated token count of `content`
    pub token_count: usize,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Stored embedding of `content`, if a provider was configured
    pub embedding: Option<Vec<f32>>,
}

impl MemoryItem {
    /// Create a fresh hot-tier item
    pub fn new(
        session_id: SessionId,
        content: impl Into<String>,
        kind: MemoryKind,
        relevance_score: f64,
    ) -> Self {
        assert!(
            (0.0..=1.0).contains(&relevance_score),
            "relevance score out of range: {}",
            relevance_score
        );

        let content = content.into();
        let token_count = estimate_tokens(&content);
        let now = Utc::now();

        Self {
            id: MemoryItemId::new(),
            session_id,
            content,
            kind,
            tier: MemoryTier::Hot,
            access_count: 0,
            last_accessed_at: now,
            created_at: now,
            relevance_score,
            token_count,
            metadata: HashMap::new(),
            embedding: None,
        }
    }

    /// Record a recall hit: bump access count, refresh the access
    /// time, and fold the new relevance into the running average.
    pub fn record_access(&mut self, relevance: f64) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
        self.relevance_score = (self.relevance_score + relevance) / 2.0;
    }

    /// Score used by the cold-tier prune: relevance plus a small
    /// credit per recorded access.
    pub fn retention_score(&self) -> f64 {
        self.relevance_score + self.access_count as f64 * 0.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::new("s1").unwrap()
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // 50 chars estimate to 13 tokens
        assert_eq!(estimate_tokens(&"x".repeat(50)), 13);
    }

    #[test]
    fn test_new_item_defaults() {
        let item = MemoryItem::new(session(), "the build uses cmake", MemoryKind::Fact, 1.0);

        assert_eq!(item.tier, MemoryTier::Hot);
        assert_eq!(item.access_count, 0);
        assert_eq!(item.token_count, 5);
        assert!(item.embedding.is_none());
    }

    #[test]
    fn test_record_access_running_average() {
        let mut item = MemoryItem::new(session(), "c", MemoryKind::Fact, 1.0);

        item.record_access(0.5);
        assert_eq!(item.access_count, 1);
        assert!((item.relevance_score - 0.75).abs() < 1e-9);

        item.record_access(0.25);
        assert!((item.relevance_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_retention_score() {
        let mut item = MemoryItem::new(session(), "c", MemoryKind::Fact, 0.4);
        item.access_count = 3;
        assert!((item.retention_score() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_item_serde_roundtrip() {
        let mut item = MemoryItem::new(session(), "remember me", MemoryKind::Decision, 0.8);
        item.embedding = Some(vec![0.1, 0.2]);
        item.metadata.insert("source".into(), "test".into());

        let bytes = serde_json::to_vec(&item).unwrap();
        let restored: MemoryItem = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(restored.id, item.id);
        assert_eq!(restored.kind, MemoryKind::Decision);
        assert_eq!(restored.created_at, item.created_at);
        assert_eq!(restored.embedding, item.embedding);
    }
}
