//! In-memory state store

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PersistenceError, StateStore};

/// State store kept in process memory.
///
/// Clones share the same records, so a test can hold one handle while an
/// AMF instance writes through another and a second instance restores from
/// it afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError> {
        self.records.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, PersistenceError> {
        self.records
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(key.to_string()))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
