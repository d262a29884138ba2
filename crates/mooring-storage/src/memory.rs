//! In-memory KV storage
//!
//! For tests and single-process agents that do not need durability.
//! Keys are held in a BTreeMap per project so prefix scans come back
//! in ascending key order.

use crate::kv::{KvTransaction, SessionKV};
use async_trait::async_trait;
use bytes::Bytes;
use mooring_core::{ProjectId, Result, TRANSACTION_KEYS_COUNT_MAX};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Per-project data: key -> value, ordered by key
type ProjectData = BTreeMap<Vec<u8>, Vec<u8>>;

/// Storage data: project id -> project data
type StorageData = HashMap<String, ProjectData>;

/// In-memory KV store
#[derive(Clone, Default)]
pub struct MemoryKV {
    data: Arc<RwLock<StorageData>>,
}

impl MemoryKV {
    /// Create a new in-memory KV store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionKV for MemoryKV {
    #[instrument(skip(self, key), fields(project = %project, key_len = key.len()))]
    async fn get(&self, project: &ProjectId, key: &[u8]) -> Result<Option<Bytes>> {
        let data = self.data.read().await;

        Ok(data
            .get(project.as_str())
            .and_then(|project_data| project_data.get(key))
            .map(|v| Bytes::copy_from_slice(v)))
    }

    #[instrument(skip(self, key, value), fields(project = %project, key_len = key.len(), value_len = value.len()))]
    async fn set(&self, project: &ProjectId, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().await;

        data.entry(project.as_str().to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());

        Ok(())
    }

    #[instrument(skip(self, key), fields(project = %project, key_len = key.len()))]
    async fn delete(&self, project: &ProjectId, key: &[u8]) -> Result<()> {
        let mut data = self.data.write().await;

        if let Some(project_data) = data.get_mut(project.as_str()) {
            project_data.remove(key);
        }

        Ok(())
    }

    #[instrument(skip(self, prefix), fields(project = %project, prefix_len = prefix.len()))]
    async fn list_keys(&self, project: &ProjectId, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let data = self.data.read().await;

        Ok(data
            .get(project.as_str())
            .map(|project_data| {
                project_data
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self), fields(project = %project))]
    async fn begin_transaction(&self, project: &ProjectId) -> Result<Box<dyn KvTransaction>> {
        Ok(Box::new(MemoryKvTransaction::new(
            project.clone(),
            self.clone(),
        )))
    }
}

/// Transaction for the in-memory KV store
///
/// Buffers writes until commit; the commit applies every buffered
/// write under one write lock so no reader observes a partial batch.
pub struct MemoryKvTransaction {
    project: ProjectId,
    storage: MemoryKV,
    /// Buffered writes: key -> Some(value) for set, None for delete
    write_buffer: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    finalized: bool,
}

impl MemoryKvTransaction {
    fn new(project: ProjectId, storage: MemoryKV) -> Self {
        Self {
            project,
            storage,
            write_buffer: BTreeMap::new(),
            finalized: false,
        }
    }
}

#[async_trait]
impl KvTransaction for MemoryKvTransaction {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        assert!(!self.finalized, "transaction already finalized");
        assert!(!key.is_empty(), "key cannot be empty");

        // Read-your-writes
        if let Some(buffered) = self.write_buffer.get(key) {
            return Ok(buffered.as_ref().map(|v| Bytes::copy_from_slice(v)));
        }

        self.storage.get(&self.project, key).await
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        assert!(!self.finalized, "transaction already finalized");
        assert!(!key.is_empty(), "key cannot be empty");

        self.write_buffer.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    async fn delete(&mut self, key: &[u8]) -> Result<()> {
        assert!(!self.finalized, "transaction already finalized");
        assert!(!key.is_empty(), "key cannot be empty");

        self.write_buffer.insert(key.to_vec(), None);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        assert!(!self.finalized, "transaction already finalized");
        assert!(
            self.write_buffer.len() <= TRANSACTION_KEYS_COUNT_MAX,
            "transaction too large: {} operations",
            self.write_buffer.len()
        );

        // Apply the whole batch under a single write lock
        let mut data = self.storage.data.write().await;
        let project_data = data.entry(self.project.as_str().to_string()).or_default();

        for (key, value) in std::mem::take(&mut self.write_buffer) {
            match value {
                Some(v) => {
                    project_data.insert(key, v);
                }
                None => {
                    project_data.remove(&key);
                }
            }
        }

        self.finalized = true;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        assert!(!self.finalized, "transaction already finalized");

        self.write_buffer.clear();
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectId {
        ProjectId::new("test-project").unwrap()
    }

    #[tokio::test]
    async fn test_memory_kv_basic() {
        let kv = MemoryKV::new();
        let project = project();

        kv.set(&project, b"key1", b"value1").await.unwrap();
        let value = kv.get(&project, b"key1").await.unwrap();
        assert_eq!(value, Some(Bytes::from("value1")));

        kv.delete(&project, b"key1").await.unwrap();
        assert!(kv.get(&project, b"key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_kv_project_isolation() {
        let kv = MemoryKV::new();
        let project1 = ProjectId::new("project-1").unwrap();
        let project2 = ProjectId::new("project-2").unwrap();

        kv.set(&project1, b"key", b"one").await.unwrap();
        kv.set(&project2, b"key", b"two").await.unwrap();

        assert_eq!(
            kv.get(&project1, b"key").await.unwrap(),
            Some(Bytes::from("one"))
        );
        assert_eq!(
            kv.get(&project2, b"key").await.unwrap(),
            Some(Bytes::from("two"))
        );
    }

    #[tokio::test]
    async fn test_list_keys_ordered() {
        let kv = MemoryKV::new();
        let project = project();

        kv.set(&project, b"checkpoint/s1/b", b"2").await.unwrap();
        kv.set(&project, b"checkpoint/s1/a", b"1").await.unwrap();
        kv.set(&project, b"memory/s1/x", b"3").await.unwrap();

        let keys = kv.list_keys(&project, b"checkpoint/s1/").await.unwrap();
        assert_eq!(keys, vec![b"checkpoint/s1/a".to_vec(), b"checkpoint/s1/b".to_vec()]);
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let kv = MemoryKV::new();
        let project = project();

        let mut txn = kv.begin_transaction(&project).await.unwrap();
        txn.set(b"key1", b"value1").await.unwrap();
        txn.set(b"key2", b"value2").await.unwrap();

        // Not visible before commit
        assert!(kv.get(&project, b"key1").await.unwrap().is_none());

        txn.commit().await.unwrap();

        assert_eq!(
            kv.get(&project, b"key1").await.unwrap(),
            Some(Bytes::from("value1"))
        );
        assert_eq!(
            kv.get(&project, b"key2").await.unwrap(),
            Some(Bytes::from("value2"))
        );
    }

    #[tokio::test]
    async fn test_transaction_abort() {
        let kv = MemoryKV::new();
        let project = project();

        let mut txn = kv.begin_transaction(&project).await.unwrap();
        txn.set(b"key1", b"value1").await.unwrap();
        txn.abort().await.unwrap();

        assert!(kv.get(&project, b"key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_read_your_writes() {
        let kv = MemoryKV::new();
        let project = project();

        kv.set(&project, b"key1", b"initial").await.unwrap();

        let mut txn = kv.begin_transaction(&project).await.unwrap();
        assert_eq!(
            txn.get(b"key1").await.unwrap(),
            Some(Bytes::from("initial"))
        );

        txn.set(b"key1", b"updated").await.unwrap();
        assert_eq!(
            txn.get(b"key1").await.unwrap(),
            Some(Bytes::from("updated"))
        );

        txn.delete(b"key1").await.unwrap();
        assert!(txn.get(b"key1").await.unwrap().is_none());

        txn.commit().await.unwrap();
        assert!(kv.get(&project, b"key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_write_then_delete_batch() {
        let kv = MemoryKV::new();
        let project = project();

        kv.set(&project, b"old", b"stale").await.unwrap();

        // A prune-after-write batch: new record in, old record out
        let mut txn = kv.begin_transaction(&project).await.unwrap();
        txn.set(b"new", b"fresh").await.unwrap();
        txn.delete(b"old").await.unwrap();
        txn.commit().await.unwrap();

        assert!(kv.get(&project, b"old").await.unwrap().is_none());
        assert_eq!(
            kv.get(&project, b"new").await.unwrap(),
            Some(Bytes::from("fresh"))
        );
    }
}
