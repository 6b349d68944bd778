//! Per-key write serialization.
//!
//! Content addressing means two writers of the same key always carry the
//! same bytes, so there is never a conflict to resolve. The coordinator only
//! has to avoid redundant physical writes and keep same-key backend calls
//! (including shard directory creation) from overlapping.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use blk_types::StorageKey;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::StoreResult;
use crate::sharded::ShardedStore;

/// What a completed put did to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    Written,
    /// The key was already present; nothing was written.
    Skipped,
}

/// Operation counters since the coordinator was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub written: u64,
    pub skipped: u64,
    pub removed: u64,
}

#[derive(Default)]
struct Latch {
    mutex: Arc<Mutex<()>>,
    /// Guards that have reserved this latch and not yet released it.
    holders: AtomicUsize,
}

type LatchTable = DashMap<String, Arc<Latch>>;

/// Serializes puts and removes that target the same storage key.
///
/// The lock table is keyed by the full key string, extension included, so
/// two extensions of one digest never contend. Entries exist only while some
/// operation holds or waits on them.
pub struct WriteCoordinator {
    store: ShardedStore,
    latches: LatchTable,
    written: AtomicU64,
    skipped: AtomicU64,
    removed: AtomicU64,
}

impl WriteCoordinator {
    pub fn new(store: ShardedStore) -> Self {
        Self {
            store,
            latches: DashMap::new(),
            written: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &ShardedStore {
        &self.store
    }

    /// Queue a write for `key` without waiting.
    ///
    /// The reservation keeps the latch entry alive; it does not queue on the
    /// lock. Same-key commits acquire the lock in the order they first poll
    /// it. Dropping the returned value at any point releases the reservation.
    pub fn reserve(&self, key: StorageKey, data: Bytes) -> PendingWrite<'_> {
        let guard = self.latch(&key);
        PendingWrite {
            coordinator: self,
            key,
            data,
            guard,
        }
    }

    pub async fn put(&self, key: StorageKey, data: Bytes) -> StoreResult<WriteOutcome> {
        self.reserve(key, data).commit().await
    }

    /// Remove `key` under its latch. Absent keys are not an error.
    pub async fn remove(&self, key: &StorageKey) -> StoreResult<()> {
        let mut guard = self.latch(key);
        guard.acquire().await;
        self.store.remove(key).await?;
        self.removed.fetch_add(1, Ordering::Relaxed);
        debug!(%key, "block removed");
        Ok(())
    }

    /// Number of keys with a live latch.
    pub fn pending_latches(&self) -> usize {
        self.latches.len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            written: self.written.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }

    fn latch(&self, key: &StorageKey) -> LatchGuard<'_> {
        let name = key.to_string();
        // Counted under the shard lock so a concurrent release cannot prune
        // the entry between lookup and increment.
        let latch = {
            let entry = self.latches.entry(name.clone()).or_default();
            entry.holders.fetch_add(1, Ordering::SeqCst);
            Arc::clone(entry.value())
        };
        LatchGuard {
            table: &self.latches,
            name,
            latch,
            permit: None,
        }
    }
}

impl std::fmt::Debug for WriteCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCoordinator")
            .field("pending_latches", &self.pending_latches())
            .field("stats", &self.stats())
            .finish()
    }
}

/// A write that holds a latch reservation but has not run yet.
pub struct PendingWrite<'a> {
    coordinator: &'a WriteCoordinator,
    key: StorageKey,
    data: Bytes,
    guard: LatchGuard<'a>,
}

impl PendingWrite<'_> {
    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Wait for the latch, then write unless the key is already present.
    pub async fn commit(self) -> StoreResult<WriteOutcome> {
        let PendingWrite {
            coordinator,
            key,
            data,
            mut guard,
        } = self;

        guard.acquire().await;
        let store = &coordinator.store;
        let outcome = if store.exists(&key).await? {
            coordinator.skipped.fetch_add(1, Ordering::Relaxed);
            WriteOutcome::Skipped
        } else {
            store.write(&key, data).await?;
            coordinator.written.fetch_add(1, Ordering::Relaxed);
            WriteOutcome::Written
        };
        drop(guard);

        debug!(%key, ?outcome, "block put");
        Ok(outcome)
    }
}

/// Reservation on one latch; holds the lock once acquired.
///
/// Dropping releases the lock and the reservation, and prunes the table
/// entry when it was the last one.
struct LatchGuard<'a> {
    table: &'a LatchTable,
    name: String,
    latch: Arc<Latch>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl LatchGuard<'_> {
    async fn acquire(&mut self) {
        if self.permit.is_none() {
            self.permit = Some(Arc::clone(&self.latch.mutex).lock_owned().await);
        }
    }
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.permit.take();
        if self.latch.holders.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.table
                .remove_if(&self.name, |_, latch| latch.holders.load(Ordering::SeqCst) == 0);
        }
    }
}
