use std::sync::Arc;

use blk_crypto::ContentHasher;
use blk_types::{Extension, KeyInput, StorageKey};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{Backend, FsBackend, MemoryBackend};
use crate::block::{Block, BlockPayload};
use crate::codec::KeyCodec;
use crate::config::{BackendConfig, BlockstoreConfig};
use crate::coordinator::{CoordinatorStats, PendingWrite, WriteCoordinator, WriteOutcome};
use crate::error::{StoreError, StoreResult};
use crate::sharded::ShardedStore;

/// Completion record for one put.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PutReceipt {
    #[serde(serialize_with = "serialize_display")]
    pub key: StorageKey,
    pub outcome: WriteOutcome,
}

/// Content-addressed blockstore.
///
/// Composes a [`KeyCodec`], a [`ShardedStore`] and a [`WriteCoordinator`].
/// Every operation borrows `&self`, so one instance can be shared behind an
/// `Arc` by any number of concurrent callers; the lock table lives exactly as
/// long as the instance.
pub struct Blockstore {
    codec: KeyCodec,
    coordinator: WriteCoordinator,
    config: BlockstoreConfig,
}

impl Blockstore {
    /// Layer a blockstore over an existing backend.
    pub fn new(backend: Arc<dyn Backend>, config: BlockstoreConfig) -> Self {
        let codec = KeyCodec::from_config(&config);
        let coordinator = WriteCoordinator::new(ShardedStore::new(backend));
        Self {
            codec,
            coordinator,
            config,
        }
    }

    /// Open the backend named by `config`.
    pub fn open(config: BlockstoreConfig) -> StoreResult<Self> {
        let backend: Arc<dyn Backend> = match &config.backend {
            BackendConfig::Memory => Arc::new(MemoryBackend::new()),
            BackendConfig::Filesystem { root } => Arc::new(FsBackend::open(root.clone())?),
        };
        info!(backend = ?config.backend, hash = %config.hash, "blockstore opened");
        Ok(Self::new(backend, config))
    }

    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), BlockstoreConfig::default())
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn config(&self) -> &BlockstoreConfig {
        &self.config
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Keys with a live write latch; zero whenever the store is idle.
    pub fn pending_latches(&self) -> usize {
        self.coordinator.pending_latches()
    }

    /// Storage key `block` would be stored under.
    pub fn key_of(&self, block: &Block) -> StorageKey {
        self.codec.to_storage_key(block.key(), block.extension())
    }

    /// Store every block of `blocks`, yielding one receipt per block in input
    /// order.
    ///
    /// Each block is validated and its latch reserved before the next input
    /// is pulled. Writes of distinct keys overlap up to `put_concurrency`.
    /// The first invalid block yields `InvalidBlock` and ends the stream
    /// without pulling further input; the stream also ends after a backend
    /// error. Dropping the stream abandons in-flight writes and releases their
    /// latches.
    pub fn put_stream<'a, S>(&'a self, blocks: S) -> impl Stream<Item = StoreResult<PutReceipt>> + Send + 'a
    where
        S: Stream<Item = Block> + Send + 'a,
    {
        self.put_pipeline(blocks.map(Ok))
    }

    /// Like [`Blockstore::put_stream`], but over boundary payloads; a text
    /// payload fails the stream with `InvalidBlock`.
    pub fn put_payload_stream<'a, S>(
        &'a self,
        payloads: S,
        extension: Option<Extension>,
    ) -> impl Stream<Item = StoreResult<PutReceipt>> + Send + 'a
    where
        S: Stream<Item = BlockPayload> + Send + 'a,
    {
        let blocks = payloads
            .map(move |payload| self.codec.block_from_payload(payload, extension.as_ref()));
        self.put_pipeline(blocks)
    }

    fn put_pipeline<'a, S>(&'a self, blocks: S) -> impl Stream<Item = StoreResult<PutReceipt>> + Send + 'a
    where
        S: Stream<Item = StoreResult<Block>> + Send + 'a,
    {
        let concurrency = self.config.put_concurrency.max(1);
        let dispatched = until_first_error(blocks.map(move |block| self.dispatch(block?)));
        let committed = dispatched
            .map(|dispatched| async move {
                let pending = dispatched?;
                let key = pending.key().clone();
                let outcome = pending.commit().await?;
                Ok::<_, StoreError>(PutReceipt { key, outcome })
            })
            .buffered(concurrency);
        until_first_error(committed)
    }

    /// Validate and hand a block to the coordinator without waiting.
    fn dispatch(&self, block: Block) -> StoreResult<PendingWrite<'_>> {
        let key = self.codec.validate(&block)?;
        Ok(self.coordinator.reserve(key, block.into_data()))
    }

    pub async fn put(&self, block: Block) -> StoreResult<PutReceipt> {
        let pending = self.dispatch(block)?;
        let key = pending.key().clone();
        let outcome = pending.commit().await?;
        Ok(PutReceipt { key, outcome })
    }

    /// Collect a put stream. Fails on the first error.
    pub async fn put_many(&self, blocks: impl IntoIterator<Item = Block>) -> StoreResult<Vec<PutReceipt>> {
        let blocks: Vec<Block> = blocks.into_iter().collect();
        let mut receipts = Vec::with_capacity(blocks.len());
        let mut results = Box::pin(self.put_stream(stream::iter(blocks)));
        while let Some(receipt) = results.next().await {
            receipts.push(receipt?);
        }
        Ok(receipts)
    }

    /// Stream yielding exactly one block, or failing with `InvalidKey` or
    /// `NotFound`.
    pub fn get_stream<'a>(
        &'a self,
        key: impl Into<KeyInput>,
        extension: Option<&str>,
    ) -> impl Stream<Item = StoreResult<Block>> + Send + 'a {
        let input = key.into();
        let extension = extension.map(str::to_owned);
        stream::once(async move { self.get(input, extension.as_deref()).await })
    }

    pub async fn get(&self, key: impl Into<KeyInput>, extension: Option<&str>) -> StoreResult<Block> {
        let key = self.codec.parse_storage_key(key, extension)?;
        self.get_key(&key).await
    }

    async fn get_key(&self, key: &StorageKey) -> StoreResult<Block> {
        let data = self.coordinator.store().read(key).await?;
        let block = Block::from_parts(data, key.digest().clone(), key.extension().clone());
        if self.config.verify_reads && !block.is_consistent() {
            let computed = ContentHasher::new(key.digest().code()).hash(block.data());
            return Err(StoreError::HashMismatch {
                key: key.clone(),
                expected: key.digest().to_hex(),
                computed: computed.to_hex(),
            });
        }
        debug!(%key, bytes = block.len(), "block read");
        Ok(block)
    }

    /// Fetch blocks for a stream of keys, in input order; ends after the
    /// first error. Reads overlap up to `put_concurrency`, the store's one
    /// fan-out setting.
    pub fn get_many<'a, S, K>(&'a self, keys: S) -> impl Stream<Item = StoreResult<Block>> + Send + 'a
    where
        S: Stream<Item = K> + Send + 'a,
        K: Into<KeyInput>,
    {
        let concurrency = self.config.put_concurrency.max(1);
        let reads = keys
            .map(move |key| {
                let key = self.codec.parse_storage_key(key, None);
                async move { self.get_key(&key?).await }
            })
            .buffered(concurrency);
        until_first_error(reads)
    }

    /// Whether a block is stored. Absent keys yield `false`, not an error.
    pub async fn has(&self, key: impl Into<KeyInput>, extension: Option<&str>) -> StoreResult<bool> {
        let key = self.codec.parse_storage_key(key, extension)?;
        self.coordinator.store().exists(&key).await
    }

    /// Remove a block. Succeeds when the block is already absent.
    pub async fn delete(&self, key: impl Into<KeyInput>, extension: Option<&str>) -> StoreResult<()> {
        let key = self.codec.parse_storage_key(key, extension)?;
        self.coordinator.remove(&key).await
    }

    /// Remove every key; stops at the first error.
    pub async fn delete_many<K>(&self, keys: impl IntoIterator<Item = K>) -> StoreResult<()>
    where
        K: Into<KeyInput>,
    {
        for key in keys {
            self.delete(key, None).await?;
        }
        Ok(())
    }

    /// Every stored key, in backend order.
    pub fn keys(&self) -> impl Stream<Item = StoreResult<StorageKey>> + Send + '_ {
        stream::once(self.coordinator.store().list()).flat_map(|listed| match listed {
            Ok(keys) => stream::iter(keys.into_iter().map(Ok)).left_stream(),
            Err(e) => stream::once(future::ready(Err(e))).right_stream(),
        })
    }
}

impl std::fmt::Debug for Blockstore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blockstore")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

/// Pass items through and end the stream right after the first error.
///
/// Nothing is pulled from `items` once an error has been yielded, and
/// `items` is dropped as soon as the stream ends.
fn until_first_error<'a, T: Send + 'a>(
    items: impl Stream<Item = StoreResult<T>> + Send + 'a,
) -> impl Stream<Item = StoreResult<T>> + Send + 'a {
    stream::unfold((Box::pin(items), false), |(mut items, failed)| async move {
        if failed {
            return None;
        }
        let item = items.next().await?;
        let failed = item.is_err();
        Some((item, (items, failed)))
    })
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
