use std::sync::Arc;

use blk_types::StorageKey;
use bytes::Bytes;
use tracing::warn;

use crate::backend::{Backend, BlockPath};
use crate::error::{StoreError, StoreResult};

/// Places storage keys into a backend using the shard layout
/// `{shard_prefix}/{encoded}.{extension}`.
///
/// This is the only component that knows the on-disk layout.
#[derive(Clone)]
pub struct ShardedStore {
    backend: Arc<dyn Backend>,
}

impl ShardedStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn locate(key: &StorageKey) -> BlockPath {
        BlockPath::new(key.shard_prefix(), key.file_name())
    }

    /// Recover the key stored at `path`, if the path follows the layout.
    pub fn key_at(path: &BlockPath) -> Option<StorageKey> {
        let parsed = StorageKey::parse(&path.to_string()).ok()?;
        let key = StorageKey::new(parsed.digest, parsed.extension?);
        // Reject names that parse only after normalization (case, hex form).
        (Self::locate(&key) == *path).then_some(key)
    }

    /// Write `data` under `key`, creating the shard directory first.
    ///
    /// Same-key calls must be serialized by the caller.
    pub async fn write(&self, key: &StorageKey, data: Bytes) -> StoreResult<()> {
        let path = Self::locate(key);
        self.backend.ensure_dir(&path.dir).await?;
        self.backend.write(&path, data).await
    }

    pub async fn read(&self, key: &StorageKey) -> StoreResult<Bytes> {
        self.backend
            .read(&Self::locate(key))
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    pub async fn exists(&self, key: &StorageKey) -> StoreResult<bool> {
        self.backend.exists(&Self::locate(key)).await
    }

    /// Remove `key`; absent keys are not an error.
    pub async fn remove(&self, key: &StorageKey) -> StoreResult<()> {
        self.backend.remove(&Self::locate(key)).await
    }

    /// Every key in the backend; entries outside the layout are skipped.
    pub async fn list(&self) -> StoreResult<Vec<StorageKey>> {
        let paths = self.backend.list().await?;
        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::key_at(&path) {
                Some(key) => keys.push(key),
                None => warn!(%path, "skipping entry outside the shard layout"),
            }
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore").finish_non_exhaustive()
    }
}
