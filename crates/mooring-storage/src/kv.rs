//! Persistence traits
//!
//! The persistence layer consumed by the checkpoint store and the
//! memory tier cache: parameterized reads and writes plus grouped
//! writes that commit or roll back together, against per-project
//! namespaced storage. Key prefixes within a project namespace play
//! the role of tables derived from the sanitized project id.

use async_trait::async_trait;
use bytes::Bytes;
use mooring_core::{ProjectId, Result};

/// Per-project KV store
#[async_trait]
pub trait SessionKV: Send + Sync {
    /// Get a value by key
    async fn get(&self, project: &ProjectId, key: &[u8]) -> Result<Option<Bytes>>;

    /// Set a key-value pair
    async fn set(&self, project: &ProjectId, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    async fn delete(&self, project: &ProjectId, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, project: &ProjectId, key: &[u8]) -> Result<bool> {
        Ok(self.get(project, key).await?.is_some())
    }

    /// List keys with a prefix, in ascending key order
    async fn list_keys(&self, project: &ProjectId, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Begin a transaction scoped to the project namespace
    ///
    /// All writes made through the returned transaction are applied
    /// atomically on commit, or discarded on abort.
    async fn begin_transaction(&self, project: &ProjectId) -> Result<Box<dyn KvTransaction>>;
}

/// A transaction over a project namespace
///
/// Provides all-or-nothing semantics for a batch of KV operations.
/// Reads observe the transaction's own uncommitted writes.
#[async_trait]
pub trait KvTransaction: Send {
    /// Get a value, observing buffered writes first
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Buffer a set operation
    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Buffer a delete operation
    async fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Apply all buffered operations atomically
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all buffered operations
    async fn abort(self: Box<Self>) -> Result<()>;
}
