//! Checkpoint persistence
//!
//! Checkpoints are immutable snapshots of [`AgentState`] tied to a
//! session and a step number. Saving and retention pruning run inside
//! one storage transaction so a freshly written checkpoint can never
//! be lost to its own prune.

use crate::types::{now, AgentState, Timestamp};
use mooring_core::{
    Error, ProjectId, Result, SessionId, AGENT_STATE_SIZE_BYTES_MAX,
    CHECKPOINTS_PER_SESSION_COUNT_DEFAULT,
};
use mooring_storage::SessionKV;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Key prefix for checkpoints in storage
pub const CHECKPOINT_KEY_PREFIX: &str = "checkpoint";

/// Unique identifier for a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(String);

impl CheckpointId {
    /// Create a new unique checkpoint ID
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

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What caused a checkpoint to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Written by the executor after a completed step or run
    Auto,
    /// Requested explicitly by the caller
    Manual,
    /// Written when a step failed
    Error,
}

impl Default for TriggerKind {
    fn default() -> Self {
        Self::Auto
    }
}

/// Metadata recorded alongside a checkpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Optional human-readable description
    pub description: Option<String>,
    /// What triggered the save
    #[serde(default)]
    pub trigger: TriggerKind,
    /// Duration of the work leading up to this checkpoint
    pub duration_ms: u64,
    /// Token usage of the work leading up to this checkpoint
    pub token_usage: Option<u64>,
}

/// An immutable snapshot of agent execution state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier
    pub id: CheckpointId,
    /// Project namespace the checkpoint belongs to
    pub project_id: ProjectId,
    /// Session the checkpoint belongs to
    pub session_id: SessionId,
    /// The state's cursor position at save time
    pub step_number: usize,
    /// When the checkpoint was written
    pub created_at: Timestamp,
    /// Full state snapshot
    pub state: AgentState,
    /// Save metadata
    pub metadata: CheckpointMeta,
}

/// A checkpoint listing entry without the state payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub id: CheckpointId,
    pub session_id: SessionId,
    pub step_number: usize,
    pub created_at: Timestamp,
    pub description: Option<String>,
    pub trigger: TriggerKind,
    pub duration_ms: u64,
    pub token_usage: Option<u64>,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            id: checkpoint.id.clone(),
            session_id: checkpoint.session_id.clone(),
            step_number: checkpoint.step_number,
            created_at: checkpoint.created_at,
            description: checkpoint.metadata.description.clone(),
            trigger: checkpoint.metadata.trigger,
            duration_ms: checkpoint.metadata.duration_ms,
            token_usage: checkpoint.metadata.token_usage,
        }
    }
}

/// Options for a single save
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Optional description recorded in metadata
    pub description: Option<String>,
    /// Trigger recorded in metadata (defaults to Auto)
    pub trigger: TriggerKind,
    /// Duration recorded in metadata
    pub duration_ms: u64,
    /// Token usage recorded in metadata
    pub token_usage: Option<u64>,
}

impl SaveOptions {
    /// Options for an automatic post-step save
    pub fn auto() -> Self {
        Self::default()
    }

    /// Options for a manual save
    pub fn manual(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            trigger: TriggerKind::Manual,
            ..Default::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the trigger
    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the duration
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Set the token usage
    pub fn with_token_usage(mut self, token_usage: u64) -> Self {
        self.token_usage = Some(token_usage);
        self
    }
}

/// Retention configuration for the checkpoint store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Number of checkpoints retained per session
    pub max_checkpoints: usize,
}

impl CheckpointConfig {
    /// Create with default settings
    pub fn new() -> Self {
        Self {
            max_checkpoints: CHECKPOINTS_PER_SESSION_COUNT_DEFAULT,
        }
    }

    /// Create with a custom retention count
    pub fn with_max_checkpoints(max_checkpoints: usize) -> Self {
        assert!(max_checkpoints > 0, "max_checkpoints must be positive");
        Self { max_checkpoints }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn session_prefix(session: &SessionId) -> Vec<u8> {
    format!("{}/{}/", CHECKPOINT_KEY_PREFIX, session).into_bytes()
}

fn checkpoint_key(session: &SessionId, id: &CheckpointId) -> Vec<u8> {
    format!("{}/{}/{}", CHECKPOINT_KEY_PREFIX, session, id).into_bytes()
}

/// Orders checkpoints best-first: highest step number, then most
/// recently created. Retention keeps a prefix of this order.
fn retention_order(a: &Checkpoint, b: &Checkpoint) -> std::cmp::Ordering {
    b.step_number
        .cmp(&a.step_number)
        .then(b.created_at.cmp(&a.created_at))
}

/// Persistent store of agent state snapshots
///
/// All checkpoints live under the store's project namespace; sessions
/// partition the key space below that.
pub struct CheckpointStore<K: SessionKV> {
    kv: Arc<K>,
    project: ProjectId,
    config: CheckpointConfig,
}

impl<K: SessionKV> CheckpointStore<K> {
    /// Create a new checkpoint store
    pub fn new(kv: Arc<K>, project: ProjectId, config: CheckpointConfig) -> Self {
        Self {
            kv,
            project,
            config,
        }
    }

    /// The project namespace this store writes to
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Save a new checkpoint and apply retention
    ///
    /// The write and the retention prune commit as one transaction, so
    /// the just-written checkpoint is never lost to the prune and a
    /// partial prune is never observable.
    pub async fn save(
        &self,
        session: &SessionId,
        state: &AgentState,
        options: SaveOptions,
    ) -> Result<Checkpoint> {
        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            project_id: self.project.clone(),
            session_id: session.clone(),
            step_number: state.current_step_index,
            created_at: now(),
            state: state.clone(),
            metadata: CheckpointMeta {
                description: options.description,
                trigger: options.trigger,
                duration_ms: options.duration_ms,
                token_usage: options.token_usage,
            },
        };

        let encoded = serde_json::to_vec(&checkpoint)?;
        if encoded.len() > AGENT_STATE_SIZE_BYTES_MAX {
            return Err(Error::storage_write_failed(
                checkpoint.id.to_string(),
                format!(
                    "serialized checkpoint is {} bytes, limit {}",
                    encoded.len(),
                    AGENT_STATE_SIZE_BYTES_MAX
                ),
            ));
        }

        // Select survivors among existing checkpoints plus the new one.
        let mut all = self.load_session(session).await?;
        all.push(checkpoint.clone());
        all.sort_by(retention_order);
        let doomed: Vec<&Checkpoint> = all.iter().skip(self.config.max_checkpoints).collect();

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        txn.set(&checkpoint_key(session, &checkpoint.id), &encoded)
            .await?;
        for old in &doomed {
            txn.delete(&checkpoint_key(session, &old.id)).await?;
        }
        let pruned = doomed.len();
        txn.commit().await?;

        debug!(
            session = %session,
            checkpoint = %checkpoint.id,
            step_number = checkpoint.step_number,
            pruned,
            "checkpoint saved"
        );

        Ok(checkpoint)
    }

    /// Load the latest checkpoint for a session
    ///
    /// Latest means highest `(step_number, created_at)`.
    pub async fn load_latest(&self, session: &SessionId) -> Result<Option<Checkpoint>> {
        let mut all = self.load_session(session).await?;
        all.sort_by(retention_order);
        Ok(all.into_iter().next())
    }

    /// Load a checkpoint by id
    pub async fn load(&self, id: &CheckpointId) -> Result<Option<Checkpoint>> {
        let prefix = format!("{}/", CHECKPOINT_KEY_PREFIX).into_bytes();
        let suffix = format!("/{}", id).into_bytes();

        for key in self.kv.list_keys(&self.project, &prefix).await? {
            if key.ends_with(&suffix) {
                if let Some(bytes) = self.kv.get(&self.project, &key).await? {
                    return Ok(Some(decode_checkpoint(&bytes)?));
                }
            }
        }
        Ok(None)
    }

    /// Load the checkpoint for a session at a specific step number
    ///
    /// Ties are broken by the most recent `created_at`.
    pub async fn load_at_step(
        &self,
        session: &SessionId,
        step_number: usize,
    ) -> Result<Option<Checkpoint>> {
        let mut at_step: Vec<Checkpoint> = self
            .load_session(session)
            .await?
            .into_iter()
            .filter(|c| c.step_number == step_number)
            .collect();
        at_step.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(at_step.into_iter().next())
    }

    /// List checkpoint summaries for a session, newest step first
    ///
    /// Summaries exclude the state payload.
    pub async fn list(&self, session: &SessionId) -> Result<Vec<CheckpointSummary>> {
        let mut all = self.load_session(session).await?;
        all.sort_by(retention_order);
        Ok(all.iter().map(CheckpointSummary::from).collect())
    }

    /// Delete a checkpoint by id
    ///
    /// Returns false if no such checkpoint exists.
    pub async fn delete(&self, id: &CheckpointId) -> Result<bool> {
        let prefix = format!("{}/", CHECKPOINT_KEY_PREFIX).into_bytes();
        let suffix = format!("/{}", id).into_bytes();

        for key in self.kv.list_keys(&self.project, &prefix).await? {
            if key.ends_with(&suffix) {
                self.kv.delete(&self.project, &key).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete every checkpoint belonging to a session
    ///
    /// Returns the number of checkpoints deleted.
    pub async fn clear_session(&self, session: &SessionId) -> Result<usize> {
        let keys = self
            .kv
            .list_keys(&self.project, &session_prefix(session))
            .await?;

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for key in &keys {
            txn.delete(key).await?;
        }
        txn.commit().await?;

        info!(session = %session, count = keys.len(), "cleared session checkpoints");
        Ok(keys.len())
    }

    /// Count checkpoints for a session
    pub async fn count(&self, session: &SessionId) -> Result<usize> {
        Ok(self
            .kv
            .list_keys(&self.project, &session_prefix(session))
            .await?
            .len())
    }

    /// Delete checkpoints older than the cutoff, across all sessions
    ///
    /// Returns the number of checkpoints deleted.
    pub async fn prune_by_age(&self, days: i64) -> Result<usize> {
        let cutoff = now() - chrono::Duration::days(days);
        let prefix = format!("{}/", CHECKPOINT_KEY_PREFIX).into_bytes();

        let mut doomed = Vec::new();
        for key in self.kv.list_keys(&self.project, &prefix).await? {
            if let Some(bytes) = self.kv.get(&self.project, &key).await? {
                let checkpoint = decode_checkpoint(&bytes)?;
                if checkpoint.created_at < cutoff {
                    doomed.push(key);
                }
            }
        }

        let mut txn = self.kv.begin_transaction(&self.project).await?;
        for key in &doomed {
            txn.delete(key).await?;
        }
        txn.commit().await?;

        info!(days, count = doomed.len(), "pruned checkpoints by age");
        Ok(doomed.len())
    }

    /// Load and decode every checkpoint for a session
    async fn load_session(&self, session: &SessionId) -> Result<Vec<Checkpoint>> {
        let keys = self
            .kv
            .list_keys(&self.project, &session_prefix(session))
            .await?;

        let mut checkpoints = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.kv.get(&self.project, &key).await? {
                checkpoints.push(decode_checkpoint(&bytes)?);
            }
        }
        Ok(checkpoints)
    }
}

fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint> {
    serde_json::from_slice(bytes).map_err(|e| Error::DeserializationFailed {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlanStep, StepResult};
    use mooring_storage::MemoryKV;

    fn store(max_checkpoints: usize) -> CheckpointStore<MemoryKV> {
        CheckpointStore::new(
            Arc::new(MemoryKV::new()),
            ProjectId::new("test-project").unwrap(),
            CheckpointConfig::with_max_checkpoints(max_checkpoints),
        )
    }

    fn session() -> SessionId {
        SessionId::new("session-1").unwrap()
    }

    fn state_at(step: usize) -> AgentState {
        let mut state = AgentState::new("test query", vec![PlanStep::new("s1", "d", "a")]);
        state.current_step_index = step;
        state
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let store = store(10);
        let session = session();

        store
            .save(&session, &state_at(0), SaveOptions::auto())
            .await
            .unwrap();
        let second = store
            .save(&session, &state_at(1), SaveOptions::auto())
            .await
            .unwrap();

        let latest = store.load_latest(&session).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.step_number, 1);
    }

    #[tokio::test]
    async fn test_load_latest_empty_session() {
        let store = store(10);
        assert!(store.load_latest(&session()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retention_invariant() {
        let store = store(3);
        let session = session();

        for step in 0..7 {
            store
                .save(&session, &state_at(step), SaveOptions::auto())
                .await
                .unwrap();
        }

        assert_eq!(store.count(&session).await.unwrap(), 3);

        // Survivors are the 3 most recent by (step_number, created_at)
        let summaries = store.list(&session).await.unwrap();
        let steps: Vec<usize> = summaries.iter().map(|s| s.step_number).collect();
        assert_eq!(steps, vec![6, 5, 4]);
    }

    #[tokio::test]
    async fn test_roundtrip_restores_dates() {
        let store = store(10);
        let session = session();

        let mut state = state_at(1);
        let completed_at = now();
        state.results.push(StepResult {
            step_id: "s1".into(),
            output: serde_json::json!({"files": ["a.rs"]}),
            completed_at,
            duration_ms: 12,
            token_usage: Some(7),
        });

        let saved = store
            .save(&session, &state, SaveOptions::auto())
            .await
            .unwrap();
        let loaded = store.load(&saved.id).await.unwrap().unwrap();

        assert_eq!(loaded.state.results[0].completed_at, completed_at);
        assert_eq!(loaded.state.results[0].output, state.results[0].output);
        assert_eq!(loaded.state.query, "test query");
    }

    #[tokio::test]
    async fn test_load_at_step_tie_break() {
        let store = store(10);
        let session = session();

        let first = store
            .save(&session, &state_at(2), SaveOptions::auto())
            .await
            .unwrap();
        let second = store
            .save(&session, &state_at(2), SaveOptions::auto())
            .await
            .unwrap();
        assert!(second.created_at >= first.created_at);

        let loaded = store.load_at_step(&session, 2).await.unwrap().unwrap();
        assert_eq!(loaded.id, second.id);
        assert!(store.load_at_step(&session, 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ordered_descending() {
        let store = store(10);
        let session = session();

        for step in [1usize, 3, 2] {
            store
                .save(&session, &state_at(step), SaveOptions::auto())
                .await
                .unwrap();
        }

        let summaries = store.list(&session).await.unwrap();
        let steps: Vec<usize> = summaries.iter().map(|s| s.step_number).collect();
        assert_eq!(steps, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let store = store(10);
        let session = session();

        let saved = store
            .save(&session, &state_at(0), SaveOptions::auto())
            .await
            .unwrap();
        assert_eq!(store.count(&session).await.unwrap(), 1);

        assert!(store.delete(&saved.id).await.unwrap());
        assert!(!store.delete(&saved.id).await.unwrap());
        assert_eq!(store.count(&session).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_session_isolated() {
        let store = store(10);
        let session_a = SessionId::new("session-a").unwrap();
        let session_b = SessionId::new("session-b").unwrap();

        store
            .save(&session_a, &state_at(0), SaveOptions::auto())
            .await
            .unwrap();
        store
            .save(&session_b, &state_at(0), SaveOptions::auto())
            .await
            .unwrap();

        assert_eq!(store.clear_session(&session_a).await.unwrap(), 1);
        assert_eq!(store.count(&session_a).await.unwrap(), 0);
        assert_eq!(store.count(&session_b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_by_age() {
        let store = store(10);
        let session = session();

        store
            .save(&session, &state_at(0), SaveOptions::auto())
            .await
            .unwrap();

        // Nothing written today is older than one day
        assert_eq!(store.prune_by_age(1).await.unwrap(), 0);
        // A cutoff in the future removes everything
        assert_eq!(store.prune_by_age(-1).await.unwrap(), 1);
        assert_eq!(store.count(&session).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_records_metadata() {
        let store = store(10);
        let session = session();

        let saved = store
            .save(
                &session,
                &state_at(0),
                SaveOptions::auto()
                    .with_trigger(TriggerKind::Error)
                    .with_description("Step 's1' failed")
                    .with_duration_ms(88),
            )
            .await
            .unwrap();

        assert_eq!(saved.metadata.trigger, TriggerKind::Error);
        assert_eq!(saved.metadata.description.as_deref(), Some("Step 's1' failed"));
        assert_eq!(saved.metadata.duration_ms, 88);
    }
}
