//! In-process result store.

use super::{PersistAck, ResultStore, StoreError, StoredResult, current_timestamp_rfc3339};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local result store.
#[derive(Default)]
pub struct MemoryResultStore {
    items: RwLock<HashMap<String, StoredResult>>,
}

impl MemoryResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys currently stored.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the store holds no items.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, pk: &str, result: &str) -> Result<PersistAck, StoreError> {
        let item = StoredResult {
            pk: pk.to_string(),
            result: result.to_string(),
            updated_at: current_timestamp_rfc3339(),
        };
        let ack = PersistAck {
            pk: item.pk.clone(),
            updated_at: item.updated_at.clone(),
            replaced: false,
        };
        let previous = self.items.write().await.insert(pk.to_string(), item);
        Ok(PersistAck {
            replaced: previous.is_some(),
            ..ack
        })
    }

    async fn get(&self, pk: &str) -> Result<Option<StoredResult>, StoreError> {
        Ok(self.items.read().await.get(pk).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_write_wins_without_duplicates() {
        let store = MemoryResultStore::new();
        store.put("raw/u/a.txt", "first").await.expect("put");
        let ack = store.put("raw/u/a.txt", "second").await.expect("put");

        assert!(ack.replaced);
        assert_eq!(store.len().await, 1);
        let stored = store.get("raw/u/a.txt").await.expect("get").expect("item");
        assert_eq!(stored.result, "second");
    }
}
