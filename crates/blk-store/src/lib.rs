//! Content-addressed block storage.
//!
//! A block is an immutable byte payload keyed by the multihash of its
//! contents. Blocks are persisted one file per block in a two-level sharded
//! layout:
//!
//! ```text
//! {root}/CIQLS/CIQLSTJHXGJU2PQIUUXFFV62PWV7VREE57RXUU4A52IIR55M4LX432I.data
//! ```
//!
//! The file name is the unpadded uppercase base32 encoding of the multihash
//! bytes plus an extension tag; the directory is its first five characters.
//!
//! # Components
//!
//! - [`KeyCodec`] -- digests, storage key derivation, and key parsing
//! - [`ShardedStore`] -- maps storage keys onto a [`Backend`]
//! - [`WriteCoordinator`] -- serializes same-key writes and skips duplicates
//! - [`Blockstore`] -- streaming put/get/has/delete over all of the above
//!
//! # Backends
//!
//! - [`MemoryBackend`] -- `HashMap`-based store for tests and embedding
//! - [`FsBackend`] -- directory tree with write-to-temp-then-rename
//!
//! # Design Rules
//!
//! 1. A key is a pure function of the block bytes (plus the extension tag).
//! 2. A present key is never rewritten; concurrent puts of one key write once.
//! 3. Readers never observe a partially written block.
//! 4. Operations on distinct keys never wait on each other.
//! 5. Lock table entries live only while an operation holds or awaits them.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod backend;
pub mod block;
pub mod blockstore;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod sharded;

pub use backend::{Backend, BlockPath, FsBackend, MemoryBackend};
pub use block::{Block, BlockPayload};
pub use blockstore::{Blockstore, PutReceipt};
pub use codec::KeyCodec;
pub use config::{BackendConfig, BlockstoreConfig};
pub use coordinator::{CoordinatorStats, WriteCoordinator, WriteOutcome};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use sharded::ShardedStore;

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use futures::stream::{self, StreamExt};

    use super::*;
    use blk_types::{Extension, StorageKey};

    const HELLO_PATH: &str = "CIQLS/CIQLSTJHXGJU2PQIUUXFFV62PWV7VREE57RXUU4A52IIR55M4LX432I.data";
    const HELLO_HEX: &str = "1220b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn memory_store() -> (Arc<MemoryBackend>, Arc<Blockstore>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Blockstore::new(backend.clone(), BlockstoreConfig::default());
        (backend, Arc::new(store))
    }

    #[tokio::test]
    async fn known_key_layout() {
        let (_, store) = memory_store();
        let receipt = store.put(Block::new(&b"hello world"[..])).await.unwrap();
        assert_eq!(receipt.key.to_string(), HELLO_PATH);
        assert_eq!(receipt.key.digest().to_hex(), HELLO_HEX);
        assert_eq!(receipt.outcome, WriteOutcome::Written);
    }

    #[tokio::test]
    async fn reads_blocks_written_by_other_producers() {
        let (backend, store) = memory_store();
        let (dir, file) = HELLO_PATH.split_once('/').unwrap();
        backend
            .write(&BlockPath::new(dir, file), Bytes::from_static(b"hello world"))
            .await
            .unwrap();

        let block = store.get(HELLO_HEX, None).await.unwrap();
        assert_eq!(block.data().as_ref(), b"hello world");
        assert!(block.is_consistent());
        assert!(store.has(HELLO_PATH, None).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_identical_puts_write_once() {
        let (backend, store) = memory_store();
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.put(Block::new(&b"same bytes"[..])).await })
            })
            .collect();

        let expected = Blockstore::in_memory().key_of(&Block::new(&b"same bytes"[..]));
        let mut written = 0;
        for task in tasks {
            let receipt = task.await.unwrap().unwrap();
            assert_eq!(receipt.key, expected);
            if receipt.outcome == WriteOutcome::Written {
                written += 1;
            }
        }
        assert_eq!(written, 1);
        assert_eq!(backend.write_count(), 1);
        assert_eq!(store.pending_latches(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_callers_share_one_set_of_blocks() {
        let (backend, store) = memory_store();
        let blocks: Arc<Vec<Block>> =
            Arc::new((0..100).map(|i| Block::new(format!("shared-{i}").into_bytes())).collect());

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let blocks = blocks.clone();
                tokio::spawn(async move {
                    store
                        .put_stream(stream::iter(blocks.as_ref().clone()))
                        .map(|r| r.unwrap())
                        .collect::<Vec<_>>()
                        .await
                })
            })
            .collect();

        let expected: Vec<StorageKey> = blocks.iter().map(|b| store.key_of(b)).collect();
        let mut receipts = 0;
        for task in tasks {
            let batch = task.await.unwrap();
            let keys: Vec<StorageKey> = batch.iter().map(|r| r.key.clone()).collect();
            assert_eq!(keys, expected);
            receipts += batch.len();
        }
        assert_eq!(receipts, 5000);
        assert_eq!(backend.write_count(), 100);
        assert_eq!(backend.len(), 100);
        assert_eq!(store.stats().written, 100);
        assert_eq!(store.stats().skipped, 4900);
        assert_eq!(store.pending_latches(), 0);
    }

    #[tokio::test]
    async fn latch_table_empties_after_failures() {
        let (_, store) = memory_store();
        let forged = Block::from_parts(
            &b"x"[..],
            Block::new(&b"y"[..]).key().clone(),
            Extension::default(),
        );
        let results: Vec<_> = store
            .put_stream(stream::iter(vec![Block::new(&b"a"[..]), forged]))
            .collect()
            .await;
        assert!(results[1].is_err());
        assert_eq!(store.pending_latches(), 0);

        assert!(store.get(None::<&str>, None).await.is_err());
        assert_eq!(store.pending_latches(), 0);
    }

    fn temporary_files(root: &Path) -> Vec<String> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .filter(|name| name.starts_with('.'))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_put_stream_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Blockstore::open(BlockstoreConfig::filesystem(dir.path())).unwrap();
        let blocks: Vec<Block> = (0..4u8)
            .map(|i| Block::new(vec![i; 16 * 1024 * 1024]))
            .collect();

        {
            let mut receipts = Box::pin(store.put_stream(stream::iter(blocks)));
            let _ = tokio::time::timeout(Duration::from_millis(5), receipts.next()).await;
        }
        assert_eq!(store.pending_latches(), 0);

        // Abandoned writes finish in the background; every one either lands
        // under its final name or cleans up after itself.
        let mut leftover = temporary_files(dir.path());
        for _ in 0..1000 {
            if leftover.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            leftover = temporary_files(dir.path());
        }
        assert!(leftover.is_empty(), "temporary files left behind: {leftover:?}");
    }

    #[tokio::test]
    async fn filesystem_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = Blockstore::open(BlockstoreConfig::filesystem(dir.path())).unwrap();

        let receipts = store
            .put_many(vec![
                Block::new(&b"hello world"[..]),
                Block::with_extension(&b"hello world 2"[..], Extension::new("ipld").unwrap()),
            ])
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join(HELLO_PATH)).unwrap(), b"hello world");
        assert!(dir
            .path()
            .join("CIQO2/CIQO2EUTF47PSTAHSL54KUTDS2AAN2DH4URM7H5KRATUGQFCM4OUIQI.ipld")
            .is_file());

        let mut listed: Vec<_> = store.keys().map(|k| k.unwrap()).collect().await;
        listed.sort();
        let mut expected: Vec<_> = receipts.iter().map(|r| r.key.clone()).collect();
        expected.sort();
        assert_eq!(listed, expected);

        // A second store over the same directory sees the same blocks.
        let reopened = Blockstore::open(BlockstoreConfig::filesystem(dir.path())).unwrap();
        let again = reopened.put(Block::new(&b"hello world"[..])).await.unwrap();
        assert_eq!(again.outcome, WriteOutcome::Skipped);

        reopened.delete(HELLO_HEX, None).await.unwrap();
        assert!(!store.has(HELLO_HEX, None).await.unwrap());
        let err = store.get(HELLO_HEX, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
