//! Tiered memory cache
//!
//! Per-session memory items across hot/warm/cold tiers. The hot tier
//! is budgeted by estimated tokens; warm and cold hold what spilled
//! out, with cold bounded by item count. Recall scans warm+cold,
//! scores against the query, and feeds demonstrated usefulness back
//! into relevance scores and tier placement.
//!
//! Calls for different sessions are independent; calls for the same
//! session must be serialized by the caller (single agent per
//! session).

use crate::config::MemoryConfig;
use crate::embedder::Embedder;
use crate::item::{MemoryItem, MemoryItemId, MemoryKind, MemoryTier};
use crate::score::{cosine_similarity, keyword_overlap};
use mooring_core::{
    ProjectId, Result, SessionId, MEMORY_HOT_UTILIZATION_SPILL_ADVISORY,
    MEMORY_RECALL_RESULTS_COUNT_DEFAULT, MEMORY_SPILL_ITEMS_COUNT_DEFAULT,
};
use mooring_storage::SessionKV;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Key prefix for memory items in storage
pub const MEMORY_KEY_PREFIX: &str = "memory";

/// Options for [`TierCache::add_to_hot`]
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Initial relevance; defaults to 1.0
    pub relevance_score: Option<f64>,
    /// Caller metadata stored on the item
    pub metadata: HashMap<String, Value>,
}

impl AddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Selection for [`TierCache::spill_to_warm`]
#[derive(Debug, Clone, Default)]
pub struct SpillRequest {
    /// Spill exactly these items; ignored items not in hot
    pub item_ids: Option<Vec<MemoryItemId>>,
    /// Number of least-valuable hot items to spill when no ids are
    /// named; defaults to 4
    pub count: Option<usize>,
}

impl SpillRequest {
    /// Spill the default number of least-valuable items
    pub fn default_count() -> Self {
        Self::default()
    }

    /// Spill exactly `count` least-valuable items
    pub fn count(count: usize) -> Self {
        Self {
            item_ids: None,
            count: Some(count),
        }
    }

    /// Spill exactly the named items
    pub fn items(item_ids: Vec<MemoryItemId>) -> Self {
        Self {
            item_ids: Some(item_ids),
            count: None,
        }
    }
}

/// One item moved out of hot and where it landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillOutcome {
    pub item_id: MemoryItemId,
    pub tier: MemoryTier,
}

/// Options for [`TierCache::recall`]
#[derive(Debug, Clone, Default)]
pub struct RecallOptions {
    /// Restrict to these kinds
    pub kinds: Option<Vec<MemoryKind>>,
    /// Drop hits scoring below this
    pub min_relevance: f64,
    /// Maximum hits returned; defaults to 3
    pub limit: Option<usize>,
    /// Override the configured auto-promotion setting
    pub auto_promote: Option<bool>,
}

impl RecallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: Vec<MemoryKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_min_relevance(mut self, min: f64) -> Self {
        self.min_relevance = min;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_auto_promote(mut self, enabled: bool) -> Self {
        self.auto_promote = Some(enabled);
        self
    }
}

/// A recall hit: the item after its access bookkeeping, plus the raw
/// query score that produced the hit
#[derive(Debug, Clone)]
pub struct RecallHit {
    pub item: MemoryItem,
    pub score: f64,
}

/// Item and token counts for one tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub items: usize,
    pub tokens: usize,
}

/// Maintenance the caller should consider running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// Hot tokens are near the budget
    Spill,
    /// Cold items exceed the configured cap
    Prune,
}

/// Snapshot of a session's tier occupancy
#[derive(Debug, Clone)]
pub struct TierStatus {
    pub hot: TierCounts,
    pub warm: TierCounts,
    pub cold: TierCounts,
    /// Hot tokens as a fraction of the budget
    pub hot_utilization: f64,
    pub suggestions: Vec<Advisory>,
}

/// Spill eviction order: least relevant first, oldest first among
/// equals.
fn eviction_order(a: &MemoryItem, b: &MemoryItem) -> Ordering {
    a.relevance_score
        .partial_cmp(&b.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then(a.created_at.cmp(&b.created_at))
}

/// Tiered per-session memory over a [`SessionKV`] backend
pub struct TierCache<K: SessionKV> {
    kv: Arc<K>,
    project: ProjectId,
    config: MemoryConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl<K: SessionKV> TierCache<K> {
    /// Create a cache; fails on an invalid configuration
    pub fn new(kv: Arc<K>, project: ProjectId, config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kv,
            project,
            config,
            embedder: None,
        })
    }

    /// Attach an embedding provider
    ///
    /// Without one, recall uses keyword overlap only.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// The cache configuration
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Insert new content into the hot tier
    ///
    /// When auto-spill is enabled and the insert would push hot tokens
    /// over the budget, the least-valuable hot items are spilled first,
    /// in the same transaction as the insert. With auto-spill disabled
    /// the budget may be overshot.
    #[instrument(skip(self, content, options), fields(session = %session))]
    pub async fn add_to_hot(
        &self,
        session: &SessionId,
        content: impl Into<String>,
        kind: MemoryKind,
        options: AddOptions,
    ) -> Result<MemoryItem> {
        let relevance = options.relevance_score.unwrap_or(1.0);
        let mut item = MemoryItem::new(session.clone(), content, kind, relevance);
        item.metadata = options.metadata;

        if let Some(embedder) = &self.embedder {
            // A failed embedding degrades to keyword-only recall for
            // this item; the insert itself still goes through
            match embedder.embed(&item.content).await {
                Ok(vector) => item.embedding = Some(vector),
                Err(e) => warn!(session = %session, error = %e, "embedding failed"),
            }
        }

        let mut spilled = Vec::new();
        if self.config.auto_spill_enabled {
            let mut hot = self.tier_items(session, MemoryTier::Hot).await?;
            let hot_tokens: usize = hot.iter().map(|i| i.token_count).sum();

            if hot_tokens + item.token_count > self.config.hot_token_limit {
                hot.sort_by(eviction_order);
                let mut freed = 0usize;
                for mut victim in hot {
                    if hot_tokens + item.token_count - freed <= self.config.hot_token_limit {
                        break;
                    }
                    freed += victim.token_count;
                    victim.tier = self.spill_destination(&victim);
                    spilled.push(victim);
                }
            }
        }

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for victim in &spilled {
            txn.set(&item_key(session, &victim.id), &serde_json::to_vec(victim)?)
                .await?;
        }
        txn.set(&item_key(session, &item.id), &serde_json::to_vec(&item)?)
            .await?;
        txn.commit().await?;

        debug!(
            session = %session,
            item = %item.id,
            tokens = item.token_count,
            spilled = spilled.len(),
            "added hot item"
        );
        Ok(item)
    }

    /// Move items out of the hot tier
    ///
    /// Named items are spilled as given; otherwise the `count`
    /// least-valuable hot items by `(relevance asc, created asc)` are
    /// selected. Each item lands in warm if its access count meets the
    /// warm threshold, else cold.
    #[instrument(skip(self, request), fields(session = %session))]
    pub async fn spill_to_warm(
        &self,
        session: &SessionId,
        request: SpillRequest,
    ) -> Result<Vec<SpillOutcome>> {
        let mut hot = self.tier_items(session, MemoryTier::Hot).await?;

        let selected: Vec<MemoryItem> = match request.item_ids {
            Some(ids) => hot.into_iter().filter(|i| ids.contains(&i.id)).collect(),
            None => {
                let count = request.count.unwrap_or(MEMORY_SPILL_ITEMS_COUNT_DEFAULT);
                hot.sort_by(eviction_order);
                hot.truncate(count);
                hot
            }
        };

        let mut outcomes = Vec::with_capacity(selected.len());
        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for mut item in selected {
            item.tier = self.spill_destination(&item);
            txn.set(&item_key(session, &item.id), &serde_json::to_vec(&item)?)
                .await?;
            outcomes.push(SpillOutcome {
                item_id: item.id,
                tier: item.tier,
            });
        }
        txn.commit().await?;

        info!(session = %session, count = outcomes.len(), "spilled hot items");
        Ok(outcomes)
    }

    /// Retrieve warm and cold items relevant to a query
    ///
    /// Scores with cosine similarity when both the query and the item
    /// carry embeddings, keyword overlap otherwise. Every returned
    /// item gets its access bookkeeping updated; hits at or above the
    /// promote threshold move to hot when auto-promotion applies.
    ///
    /// A degenerate query scores low rather than erroring.
    #[instrument(skip(self, query, options), fields(session = %session))]
    pub async fn recall(
        &self,
        session: &SessionId,
        query: &str,
        options: RecallOptions,
    ) -> Result<Vec<RecallHit>> {
        // Like inserts, a failed query embedding degrades to the
        // keyword path instead of erroring the recall
        let query_embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(query).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(session = %session, error = %e, "query embedding failed");
                    None
                }
            },
            None => None,
        };

        let candidates: Vec<MemoryItem> = self
            .session_items(session)
            .await?
            .into_iter()
            .filter(|i| matches!(i.tier, MemoryTier::Warm | MemoryTier::Cold))
            .filter(|i| match &options.kinds {
                Some(kinds) => kinds.contains(&i.kind),
                None => true,
            })
            .collect();

        let mut scored: Vec<(MemoryItem, f64)> = candidates
            .into_iter()
            .map(|item| {
                let score = match (&query_embedding, &item.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => keyword_overlap(query, &item.content),
                };
                (item, score)
            })
            .filter(|(_, score)| *score >= options.min_relevance)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(options.limit.unwrap_or(MEMORY_RECALL_RESULTS_COUNT_DEFAULT));

        // Persist access bookkeeping for every hit before any
        // promotion looks at the updated records
        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for (item, score) in &mut scored {
            item.record_access(*score);
            txn.set(&item_key(session, &item.id), &serde_json::to_vec(item)?)
                .await?;
        }
        txn.commit().await?;

        let auto_promote = options
            .auto_promote
            .unwrap_or(self.config.auto_promote_enabled);

        let mut hits = Vec::with_capacity(scored.len());
        for (mut item, score) in scored {
            if auto_promote && score >= self.config.promote_threshold {
                if self.promote_to_hot(&item.id).await? {
                    item.tier = MemoryTier::Hot;
                    item.relevance_score = 1.0;
                }
            }
            hits.push(RecallHit { item, score });
        }

        debug!(session = %session, hits = hits.len(), "recall");
        Ok(hits)
    }

    /// Promote an item into the hot tier
    ///
    /// Returns false if the item is missing or already hot. If the
    /// item's tokens would blow the hot budget, two items are spilled
    /// first; the promotion then proceeds regardless. Promotion resets
    /// the relevance score to 1.0.
    #[instrument(skip(self), fields(item = %item_id))]
    pub async fn promote_to_hot(&self, item_id: &MemoryItemId) -> Result<bool> {
        let Some(mut item) = self.get_item(item_id).await? else {
            return Ok(false);
        };
        if item.tier == MemoryTier::Hot {
            return Ok(false);
        }

        let session = item.session_id.clone();
        let hot = self.tier_items(&session, MemoryTier::Hot).await?;
        let hot_tokens: usize = hot.iter().map(|i| i.token_count).sum();
        if hot_tokens + item.token_count > self.config.hot_token_limit {
            self.spill_to_warm(&session, SpillRequest::count(2)).await?;
        }

        item.tier = MemoryTier::Hot;
        item.relevance_score = 1.0;
        self.kv
            .set(&self.project, &item_key(&session, &item.id), &serde_json::to_vec(&item)?)
            .await?;

        debug!(session = %session, item = %item.id, "promoted to hot");
        Ok(true)
    }

    /// Move an item to a tier directly, with no eligibility checks
    ///
    /// Returns false if the item does not exist.
    #[instrument(skip(self), fields(item = %item_id, tier = %target_tier))]
    pub async fn demote(&self, item_id: &MemoryItemId, target_tier: MemoryTier) -> Result<bool> {
        let Some(mut item) = self.get_item(item_id).await? else {
            return Ok(false);
        };

        item.tier = target_tier;
        self.kv
            .set(
                &self.project,
                &item_key(&item.session_id, &item.id),
                &serde_json::to_vec(&item)?,
            )
            .await?;
        Ok(true)
    }

    /// Demote to the default target tier, warm
    pub async fn demote_to_warm(&self, item_id: &MemoryItemId) -> Result<bool> {
        self.demote(item_id, MemoryTier::Warm).await
    }

    /// Per-tier occupancy and maintenance advisories for a session
    pub async fn status(&self, session: &SessionId) -> Result<TierStatus> {
        let mut hot = TierCounts::default();
        let mut warm = TierCounts::default();
        let mut cold = TierCounts::default();

        for item in self.session_items(session).await? {
            let counts = match item.tier {
                MemoryTier::Hot => &mut hot,
                MemoryTier::Warm => &mut warm,
                MemoryTier::Cold => &mut cold,
            };
            counts.items += 1;
            counts.tokens += item.token_count;
        }

        let hot_utilization = hot.tokens as f64 / self.config.hot_token_limit as f64;

        let mut suggestions = Vec::new();
        if hot_utilization > MEMORY_HOT_UTILIZATION_SPILL_ADVISORY {
            suggestions.push(Advisory::Spill);
        }
        if cold.items > self.config.max_cold_items {
            suggestions.push(Advisory::Prune);
        }

        Ok(TierStatus {
            hot,
            warm,
            cold,
            hot_utilization,
            suggestions,
        })
    }

    /// Enforce the cold tier item cap
    ///
    /// Keeps the `max_cold_items` highest items by retention score
    /// (relevance plus 0.1 per access) and deletes the rest, in one
    /// transaction. Returns the number deleted.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn prune_cold(&self, session: &SessionId) -> Result<usize> {
        let mut cold = self.tier_items(session, MemoryTier::Cold).await?;
        if cold.len() <= self.config.max_cold_items {
            return Ok(0);
        }

        cold.sort_by(|a, b| {
            b.retention_score()
                .partial_cmp(&a.retention_score())
                .unwrap_or(Ordering::Equal)
        });
        let doomed: Vec<MemoryItem> = cold.split_off(self.config.max_cold_items);

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for item in &doomed {
            txn.delete(&item_key(session, &item.id)).await?;
        }
        txn.commit().await?;

        info!(session = %session, count = doomed.len(), "pruned cold items");
        Ok(doomed.len())
    }

    /// Delete an item; false if it does not exist
    pub async fn delete(&self, item_id: &MemoryItemId) -> Result<bool> {
        let Some(item) = self.get_item(item_id).await? else {
            return Ok(false);
        };
        self.kv
            .delete(&self.project, &item_key(&item.session_id, &item.id))
            .await?;
        Ok(true)
    }

    /// Delete every item for a session; returns the number deleted
    pub async fn clear_session(&self, session: &SessionId) -> Result<usize> {
        let keys = self
            .kv
            .list_keys(&self.project, &session_key_prefix(session))
            .await?;

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for key in &keys {
            txn.delete(key).await?;
        }
        txn.commit().await?;

        info!(session = %session, count = keys.len(), "cleared session memory");
        Ok(keys.len())
    }

    /// Items of a session in one tier
    pub async fn get_by_tier(
        &self,
        session: &SessionId,
        tier: MemoryTier,
    ) -> Result<Vec<MemoryItem>> {
        self.tier_items(session, tier).await
    }

    /// Look an item up by id across sessions
    pub async fn get_item(&self, item_id: &MemoryItemId) -> Result<Option<MemoryItem>> {
        let prefix = format!("{}/", MEMORY_KEY_PREFIX).into_bytes();
        let suffix = format!("/{}", item_id).into_bytes();

        for key in self.kv.list_keys(&self.project, &prefix).await? {
            if key.ends_with(&suffix) {
                if let Some(bytes) = self.kv.get(&self.project, &key).await? {
                    return Ok(Some(decode_item(&bytes)?));
                }
            }
        }
        Ok(None)
    }

    fn spill_destination(&self, item: &MemoryItem) -> MemoryTier {
        if item.access_count >= self.config.warm_access_threshold {
            MemoryTier::Warm
        } else {
            MemoryTier::Cold
        }
    }

    async fn session_items(&self, session: &SessionId) -> Result<Vec<MemoryItem>> {
        let keys = self
            .kv
            .list_keys(&self.project, &session_key_prefix(session))
            .await?;

        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.kv.get(&self.project, &key).await? {
                items.push(decode_item(&bytes)?);
            }
        }
        Ok(items)
    }

    async fn tier_items(&self, session: &SessionId, tier: MemoryTier) -> Result<Vec<MemoryItem>> {
        Ok(self
            .session_items(session)
            .await?
            .into_iter()
            .filter(|i| i.tier == tier)
            .collect())
    }
}

fn session_key_prefix(session: &SessionId) -> Vec<u8> {
    format!("{}/{}/", MEMORY_KEY_PREFIX, session).into_bytes()
}

fn item_key(session: &SessionId, id: &MemoryItemId) -> Vec<u8> {
    format!("{}/{}/{}", MEMORY_KEY_PREFIX, session, id).into_bytes()
}

fn decode_item(bytes: &[u8]) -> Result<MemoryItem> {
    serde_json::from_slice(bytes).map_err(|e| mooring_core::Error::DeserializationFailed {
        reason: e.to_string(),
    })
}
