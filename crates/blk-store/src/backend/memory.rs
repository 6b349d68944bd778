use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{Backend, BlockPath};
use crate::error::StoreResult;

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Values are held behind a `RwLock`;
/// `Bytes` makes reads a reference-count bump rather than a copy. Every
/// physical write is counted so callers can observe deduplication.
pub struct MemoryBackend {
    entries: RwLock<HashMap<BlockPath, Bytes>>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Physical writes performed since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total bytes across all stored entries.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn write(&self, path: &BlockPath, data: Bytes) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(path.clone(), data);
        Ok(())
    }

    async fn read(&self, path: &BlockPath) -> StoreResult<Option<Bytes>> {
        Ok(self.entries.read().expect("lock poisoned").get(path).cloned())
    }

    async fn exists(&self, path: &BlockPath) -> StoreResult<bool> {
        Ok(self.entries.read().expect("lock poisoned").contains_key(path))
    }

    async fn remove(&self, path: &BlockPath) -> StoreResult<()> {
        self.entries.write().expect("lock poisoned").remove(path);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<BlockPath>> {
        let mut paths: Vec<BlockPath> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entry_count", &self.len())
            .field("write_count", &self.write_count())
            .finish()
    }
}
