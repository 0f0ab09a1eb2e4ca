use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of pool activity returned by
/// [`StatementPool::metrics()`][crate::pool::StatementPool::metrics].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolMetricsSnapshot {
    /// Prepares satisfied from the idle set, without a driver call.
    pub hits: u64,

    /// Prepares that created a new physical statement.
    pub misses: u64,

    /// Idle statements destroyed to enforce the capacity, either to admit
    /// a new statement or to honor a lowered `max_open`.
    pub evictions: u64,

    /// Statements force-destroyed through `invalidate` or
    /// `invalidate_all`.
    pub invalidations: u64,

    /// Physical statements handed to the driver for closing, for any
    /// reason.
    pub destroyed: u64,

    /// Statements checked out when the snapshot was taken.
    pub active: usize,

    /// Statements idle in the pool when the snapshot was taken.
    pub idle: usize,
}

/// Counters behind [`PoolMetricsSnapshot`]. All updates are `Relaxed`;
/// the numbers are monotone totals, not a consistent view.
#[derive(Debug, Default)]
pub(crate) struct PoolMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
    destroyed: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active: usize, idle: usize) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            active,
            idle,
        }
    }
}
