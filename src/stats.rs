use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::StoreError;

/// Central statistics hub shared by a store instance.
#[derive(Debug, Default)]
pub struct Statistics {
    // Entry metrics
    pub entry_count: AtomicUsize,

    // Operation counters
    pub total_gets: AtomicU64,
    pub total_adds: AtomicU64,
    pub total_updates: AtomicU64,
    pub total_removes: AtomicU64,
    pub total_enumerations: AtomicU64,

    // Operation latencies (in nanoseconds)
    pub get_latency_ns: AtomicU64,
    pub add_latency_ns: AtomicU64,
    pub remove_latency_ns: AtomicU64,

    // Publish metrics (snapshot store)
    pub swap_count: AtomicU64,
    pub swap_latency_ns: AtomicU64,
    pub nodes_published: AtomicU64,
    pub value_bytes_published: AtomicU64,

    // Error counters
    pub key_not_found_errors: AtomicU64,
    pub corrupt_errors: AtomicU64,
    pub io_errors: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self, latency_ns: u64, found: bool) {
        self.total_gets.fetch_add(1, Ordering::Relaxed);
        self.get_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
        if !found {
            self.key_not_found_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_add(&self, latency_ns: u64, is_update: bool) {
        if is_update {
            self.total_updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_adds.fetch_add(1, Ordering::Relaxed);
        }
        self.add_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
    }

    pub fn record_remove(&self, latency_ns: u64) {
        self.total_removes.fetch_add(1, Ordering::Relaxed);
        self.remove_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
    }

    /// Record errors
    pub fn record_error(&self, error: &StoreError) {
        match error {
            StoreError::Corrupt(_) => {
                self.corrupt_errors.fetch_add(1, Ordering::Relaxed);
            }
            StoreError::Io(_) => {
                self.io_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_swap(&self, latency_ns: u64, nodes: u64, value_bytes: u64) {
        self.swap_count.fetch_add(1, Ordering::Relaxed);
        self.swap_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
        self.nodes_published.store(nodes, Ordering::Relaxed);
        self.value_bytes_published
            .store(value_bytes, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            entry_count: self.entry_count.load(Ordering::Acquire),
            total_gets: self.total_gets.load(Ordering::Relaxed),
            total_adds: self.total_adds.load(Ordering::Relaxed),
            total_updates: self.total_updates.load(Ordering::Relaxed),
            total_removes: self.total_removes.load(Ordering::Relaxed),
            total_enumerations: self.total_enumerations.load(Ordering::Relaxed),
            avg_get_latency_ns: avg(
                self.get_latency_ns.load(Ordering::Relaxed),
                self.total_gets.load(Ordering::Relaxed),
            ),
            avg_add_latency_ns: avg(
                self.add_latency_ns.load(Ordering::Relaxed),
                self.total_adds.load(Ordering::Relaxed)
                    + self.total_updates.load(Ordering::Relaxed),
            ),
            avg_remove_latency_ns: avg(
                self.remove_latency_ns.load(Ordering::Relaxed),
                self.total_removes.load(Ordering::Relaxed),
            ),
            swap_count: self.swap_count.load(Ordering::Relaxed),
            avg_swap_latency_ns: avg(
                self.swap_latency_ns.load(Ordering::Relaxed),
                self.swap_count.load(Ordering::Relaxed),
            ),
            nodes_published: self.nodes_published.load(Ordering::Relaxed),
            value_bytes_published: self.value_bytes_published.load(Ordering::Relaxed),
            key_not_found_errors: self.key_not_found_errors.load(Ordering::Relaxed),
            corrupt_errors: self.corrupt_errors.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }
}

fn avg(total: u64, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        total / count
    }
}

/// Point-in-time view of [`Statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub entry_count: usize,
    pub total_gets: u64,
    pub total_adds: u64,
    pub total_updates: u64,
    pub total_removes: u64,
    pub total_enumerations: u64,
    pub avg_get_latency_ns: u64,
    pub avg_add_latency_ns: u64,
    pub avg_remove_latency_ns: u64,
    pub swap_count: u64,
    pub avg_swap_latency_ns: u64,
    pub nodes_published: u64,
    pub value_bytes_published: u64,
    pub key_not_found_errors: u64,
    pub corrupt_errors: u64,
    pub io_errors: u64,
}

impl StatsSnapshot {
    /// Render a human-readable report block.
    pub fn report(&self) -> String {
        format!(
            "entries: {}\n\
             ops: {} gets, {} adds, {} updates, {} removes, {} enumerations\n\
             latency: get {}ns, add {}ns, remove {}ns\n\
             publish: {} swaps, avg {}ns, last {} nodes / {} value bytes\n\
             errors: {} not-found, {} corrupt, {} io",
            self.entry_count,
            self.total_gets,
            self.total_adds,
            self.total_updates,
            self.total_removes,
            self.total_enumerations,
            self.avg_get_latency_ns,
            self.avg_add_latency_ns,
            self.avg_remove_latency_ns,
            self.swap_count,
            self.avg_swap_latency_ns,
            self.nodes_published,
            self.value_bytes_published,
            self.key_not_found_errors,
            self.corrupt_errors,
            self.io_errors,
        )
    }
}
