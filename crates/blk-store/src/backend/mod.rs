//! Raw byte stores the blockstore layers on top of.
//!
//! A backend only knows paths of the form `dir/file`; the sharded layout is
//! decided by [`crate::ShardedStore`].

pub mod fs;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

pub use fs::FsBackend;
pub use memory::MemoryBackend;

/// Backend location of one block: a directory and a file name within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPath {
    pub dir: String,
    pub file: String,
}

impl BlockPath {
    pub fn new(dir: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dir, self.file)
    }
}

/// Flat or hierarchical byte store.
///
/// Implementations must satisfy:
/// - Concurrent reads, and concurrent writes to distinct paths, are safe.
/// - Writes to the same path are only ever issued through the write
///   coordinator, never concurrently.
/// - `write` replaces the whole value; readers never see a partial write.
/// - `remove` of an absent path succeeds.
/// - All I/O errors are propagated, never silently ignored or retried.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn write(&self, path: &BlockPath, data: Bytes) -> StoreResult<()>;

    /// Returns `Ok(None)` if nothing is stored at `path`.
    async fn read(&self, path: &BlockPath) -> StoreResult<Option<Bytes>>;

    async fn exists(&self, path: &BlockPath) -> StoreResult<bool>;

    async fn remove(&self, path: &BlockPath) -> StoreResult<()>;

    /// Prepare `dir` for writes. Idempotent and safe to call concurrently.
    ///
    /// Backends without directories keep the default no-op.
    async fn ensure_dir(&self, _dir: &str) -> StoreResult<()> {
        Ok(())
    }

    /// Every stored path, in no particular order.
    async fn list(&self) -> StoreResult<Vec<BlockPath>>;
}
