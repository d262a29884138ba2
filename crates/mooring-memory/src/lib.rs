//! Mooring Memory
//!
//! Tiered session memory for the Mooring agent memory engine.
//!
//! # Overview
//!
//! An agent keeps a bounded hot working set of recent facts; older
//! material spills to warm and cold tiers, comes back through
//! relevance-scored recall, and is eventually pruned:
//!
//! - [`item`]: memory items, kinds, tiers, token estimation
//! - [`config`]: per-cache configuration
//! - [`score`]: cosine similarity and keyword-overlap scoring
//! - [`embedder`]: the optional embedding provider seam
//! - [`cache`]: the tier cache itself

pub mod cache;
pub mod config;
pub mod embedder;
pub mod item;
pub mod score;

pub use cache::{
    AddOptions, Advisory, RecallHit, RecallOptions, SpillOutcome, SpillRequest, TierCache,
    TierCounts, TierStatus,
};
pub use config::MemoryConfig;
pub use embedder::{Embedder, MockEmbedder};
pub use item::{estimate_tokens, MemoryItem, MemoryItemId, MemoryKind, MemoryTier};
pub use score::{cosine_similarity, keyword_overlap};
