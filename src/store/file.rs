//! One JSON file per partition key under a root directory.

use super::{PersistAck, ResultStore, StoreError, StoredResult, current_timestamp_rfc3339};
use crate::config::get_config;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One JSON document per key, named by the SHA-256 digest of the key.
///
/// Writes land in a temporary file first and are renamed over the target, so readers see
/// either the previous value or the new one, never a partial write.
pub struct FileResultStore {
    root: PathBuf,
}

impl FileResultStore {
    /// Open the store configured by `RESULT_STORE_DIR`.
    pub async fn new() -> Result<Self, StoreError> {
        Self::open(&get_config().result_store_dir).await
    }

    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "Result store ready");
        Ok(Self { root })
    }

    fn item_path(&self, pk: &str) -> PathBuf {
        self.root.join(format!("{}.json", compute_key_digest(pk)))
    }
}

/// Deterministic file-safe digest of a partition key.
pub(crate) fn compute_key_digest(pk: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pk.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn put(&self, pk: &str, result: &str) -> Result<PersistAck, StoreError> {
        let target = self.item_path(pk);
        let replaced = tokio::fs::try_exists(&target).await?;
        let item = StoredResult {
            pk: pk.to_string(),
            result: result.to_string(),
            updated_at: current_timestamp_rfc3339(),
        };
        let encoded = serde_json::to_vec(&item)?;

        let staging = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&staging, &encoded).await?;
        if let Err(error) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }

        tracing::debug!(pk, replaced, bytes = encoded.len(), "Result persisted");
        Ok(PersistAck {
            pk: item.pk,
            updated_at: item.updated_at,
            replaced,
        })
    }

    async fn get(&self, pk: &str) -> Result<Option<StoredResult>, StoreError> {
        match tokio::fs::read(self.item_path(pk)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_digest_is_stable() {
        let first = compute_key_digest("raw/user123/list.txt");
        let second = compute_key_digest("raw/user123/list.txt");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, compute_key_digest("raw/user123/other.txt"));
    }

    #[tokio::test]
    async fn second_put_replaces_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileResultStore::open(dir.path()).await.expect("store");

        let first = store
            .put("raw/user123/list.txt", "ebullient")
            .await
            .expect("first put");
        let second = store
            .put("raw/user123/list.txt", "ebullient,laconic")
            .await
            .expect("second put");

        assert!(!first.replaced);
        assert!(second.replaced);

        let stored = store
            .get("raw/user123/list.txt")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.result, "ebullient,laconic");

        let entries = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileResultStore::open(dir.path()).await.expect("store");
        assert!(store.get("raw/nobody.txt").await.expect("get").is_none());
    }
}
