//! Memory-mapped immutable snapshot backend.
//!
//! The store keeps one active snapshot (an `Arc<Snapshot>` behind a
//! read-write lock) and a mutable staging trie behind the staging lock.
//! Mutations land in staging; `swap()` serializes staging into a fresh
//! file, moves it over the target, and atomically retires the previous
//! snapshot. Readers that hold a lease keep the old mapping alive until
//! they finish.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::codec::ValueCodec;
use crate::error::{Result, StoreError};
use crate::stats::{Statistics, StatsSnapshot};

pub(crate) mod layout;
pub(crate) mod snapshot;
pub(crate) mod staging;
pub(crate) mod writer;

mod builder;
mod iter;
mod operations;

pub use builder::{StoreBuilder, StoreConfig};
pub use iter::MmapIter;

use snapshot::Snapshot;
use staging::StagingTrie;

/// Domain-name keyed store backed by a single memory-mapped snapshot file.
///
/// # Thread safety
///
/// Reads are lock-free against the active snapshot; mutations serialize on
/// the staging lock; `swap()` publishes a complete new generation without
/// ever writing into the live file.
pub struct MmapStore<C: ValueCodec> {
    active: RwLock<Option<Arc<Snapshot>>>,
    staging: Mutex<Option<StagingTrie>>,
    path: PathBuf,
    codec: C,
    node_capacity: u64,
    value_capacity: u64,
    stats: Arc<Statistics>,
    disposed: AtomicBool,
}

impl<C: ValueCodec> MmapStore<C> {
    /// Open (or bootstrap) a snapshot store at `path`.
    pub fn open(path: impl Into<PathBuf>, codec: C) -> Result<Self> {
        StoreBuilder::new(path).build(codec)
    }

    pub(crate) fn with_config(config: StoreConfig, codec: C) -> Result<Self> {
        writer::recover_sidecars(&config.path)?;
        let missing = match std::fs::metadata(&config.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if missing {
            // Bootstrap an empty generation so the store is always open on
            // a valid mapping.
            writer::publish(
                &StagingTrie::new(),
                &config.path,
                config.node_capacity,
                config.value_capacity,
            )?;
            debug!(path = %config.path.display(), "bootstrapped empty snapshot");
        }
        let snapshot = Arc::new(Snapshot::open(&config.path)?);
        let stats = Arc::new(Statistics::new());
        stats
            .entry_count
            .store(snapshot.value_count(), Ordering::Release);
        Ok(Self {
            active: RwLock::new(Some(snapshot)),
            staging: Mutex::new(None),
            path: config.path,
            codec,
            node_capacity: config.node_capacity,
            value_capacity: config.value_capacity,
            stats,
            disposed: AtomicBool::new(false),
        })
    }

    /// Publish staged mutations as a new snapshot generation.
    ///
    /// Transactional: on any failure the active snapshot and the staging
    /// trie are unchanged. Readers that acquired the previous snapshot keep
    /// it alive until their leases drop.
    pub fn swap(&self) -> Result<()> {
        self.ensure_open()?;
        let start = Instant::now();
        let mut guard = self.staging.lock();
        let staging = self.track(Self::materialized_in(&self.active, &mut guard))?;
        let cloned = staging.clone();
        let publish = self.track(writer::publish(
            &cloned,
            &self.path,
            self.node_capacity,
            self.value_capacity,
        ))?;
        // Re-open failure leaves the previous snapshot active.
        let snapshot = Arc::new(self.track(Snapshot::open(&self.path))?);
        *self.active.write() = Some(snapshot);
        self.stats.record_swap(
            start.elapsed().as_nanos() as u64,
            publish.nodes,
            publish.value_bytes,
        );
        Ok(())
    }

    /// Mark the store disposed and drop the publisher's snapshot reference.
    ///
    /// In-flight enumerators report `Disposed` on their next step; the
    /// mapping itself is unmapped once the last lease drops.
    pub fn close(&self) {
        self.disposed.store(true, Ordering::Release);
        *self.active.write() = None;
        *self.staging.lock() = None;
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn codec(&self) -> &C {
        &self.codec
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Take a lease on the active snapshot.
    pub(crate) fn acquire_active(&self) -> Result<Arc<Snapshot>> {
        self.active.read().clone().ok_or(StoreError::Disposed)
    }

    /// Count corrupt/I/O failures on their way out.
    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.stats.record_error(err);
        }
        result
    }

    /// Run `f` against the staging trie, materializing it from the active
    /// snapshot on first use so staged state is a superset of published
    /// state (read-your-writes across `swap`).
    pub(crate) fn with_staging<R>(
        &self,
        f: impl FnOnce(&mut StagingTrie) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.staging.lock();
        let staging = self.track(Self::materialized_in(&self.active, &mut guard))?;
        let result = f(staging);
        self.stats
            .entry_count
            .store(staging.len(), Ordering::Release);
        result
    }

    /// Read through staging when it exists, else through the snapshot.
    pub(crate) fn read_value<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(Option<&[u8]>) -> Result<R>,
    ) -> Result<R> {
        let guard = self.staging.lock();
        if let Some(staging) = guard.as_ref() {
            return f(staging.get(key).map(|b| &b[..]));
        }
        drop(guard);
        let snapshot = self.acquire_active()?;
        match self.track(snapshot.find_node(key, true))? {
            Some(node) => {
                let bytes = self.track(snapshot.value_bytes(&node))?;
                f(bytes)
            }
            None => f(None),
        }
    }

    pub(crate) fn live_len(&self) -> usize {
        let guard = self.staging.lock();
        if let Some(staging) = guard.as_ref() {
            return staging.len();
        }
        drop(guard);
        match self.acquire_active() {
            Ok(snapshot) => snapshot.value_count(),
            Err(_) => 0,
        }
    }

    fn materialized_in<'a>(
        active: &RwLock<Option<Arc<Snapshot>>>,
        guard: &'a mut Option<StagingTrie>,
    ) -> Result<&'a mut StagingTrie> {
        if guard.is_none() {
            let snapshot = active
                .read()
                .clone()
                .ok_or(StoreError::Disposed)?;
            let mut trie = StagingTrie::new();
            snapshot.for_each_entry(|key, bytes| {
                trie.insert(key, Bytes::copy_from_slice(bytes), true);
                Ok(())
            })?;
            *guard = Some(trie);
        }
        Ok(guard.get_or_insert_with(StagingTrie::new))
    }
}
