//! Keyed pooling of prepared statements with LRU eviction.
//!
//! A [`StatementPool`] caches the physical prepared statements of one
//! connection, keyed by [`StatementKey`]. Requesting a key with an idle
//! match checks the cached statement back out; requesting anything else
//! prepares a new one, evicting the least recently used idle statement
//! first when the pool is at its `max_open` bound. When the pool is at
//! the bound and every statement is checked out, preparing fails
//! immediately with [`Error::PoolExhausted`][crate::Error::PoolExhausted]
//! rather than waiting.
//!
//! Most callers go through
//! [`PoolingConnection`][crate::connection::PoolingConnection], which
//! builds the keys from its session context.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

mod evict;
pub(crate) mod inner;
mod metrics;
mod options;
pub(crate) mod slot;

pub use metrics::PoolMetricsSnapshot;
pub use options::PoolOptions;
pub use slot::SlotId;

use crate::driver::StatementDriver;
use crate::error::Result;
use crate::key::StatementKey;
use crate::statement::PooledStatement;
use inner::SharedPool;

/// A keyed, capacity-bounded pool of prepared statements for a single
/// connection.
///
/// Cheap to clone; every clone and every checked-out
/// [`PooledStatement`] shares the same pool.
pub struct StatementPool<D: StatementDriver>(pub(crate) Arc<SharedPool<D>>);

impl<D: StatementDriver> StatementPool<D> {
    /// Create a pool around `driver` with default [`PoolOptions`].
    pub fn new(driver: D) -> Self {
        PoolOptions::new().build(driver)
    }

    /// Check out the pooled statement for `key`, preparing one if no
    /// idle match is cached.
    ///
    /// Returns [`Error::PoolExhausted`][crate::Error::PoolExhausted] when
    /// the pool is full of checked-out statements, and
    /// [`Error::ConnectionClosed`][crate::Error::ConnectionClosed] after
    /// [`close_all`][Self::close_all].
    pub fn prepare(&self, key: StatementKey) -> Result<PooledStatement<D>> {
        let slot = self.0.prepare(key)?;
        Ok(PooledStatement::new(self.clone(), slot))
    }

    /// Number of statements currently checked out.
    pub fn active_count(&self) -> usize {
        self.0.counts().0
    }

    /// Number of idle statements cached in the pool.
    pub fn idle_count(&self) -> usize {
        self.0.counts().1
    }

    /// Total statements the pool currently holds open, checked-out and
    /// idle together.
    pub fn size(&self) -> usize {
        let (active, idle) = self.0.counts();
        active + idle
    }

    /// The current capacity; negative means unbounded.
    pub fn max_open(&self) -> i64 {
        self.0.max_open()
    }

    /// Change the capacity at runtime.
    ///
    /// Shrinking below the current size closes idle statements
    /// oldest-first immediately; statements still checked out are closed
    /// as they are returned, instead of being cached.
    pub fn set_max_open(&self, max_open: i64) {
        self.0.set_max_open(max_open);
    }

    /// Counters and current occupancy.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.0.metrics_snapshot()
    }

    /// Destroy every pooled statement, checked-out handles included, but
    /// keep the pool usable.
    ///
    /// Outstanding [`PooledStatement`]s observe
    /// [`Error::StatementClosed`][crate::Error::StatementClosed] from then
    /// on; statements prepared afterwards start fresh.
    pub fn invalidate_all(&self) -> Result<()> {
        self.0.invalidate_all()
    }

    /// Tear the pool down: destroy every pooled statement and fail all
    /// further prepares.
    ///
    /// Every statement is destroyed even on error; the first driver
    /// error encountered is returned.
    pub fn close_all(&self) -> Result<()> {
        self.0.close_all()
    }

    /// Whether [`close_all`][Self::close_all] has run.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// The driver this pool prepares statements through.
    pub fn driver(&self) -> &D {
        &self.0.driver
    }
}

impl<D: StatementDriver> Clone for StatementPool<D> {
    fn clone(&self) -> Self {
        StatementPool(Arc::clone(&self.0))
    }
}

impl<D: StatementDriver> Debug for StatementPool<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (active, idle) = self.0.counts();
        f.debug_struct("StatementPool")
            .field("active", &active)
            .field("idle", &idle)
            .field("max_open", &self.0.max_open())
            .finish()
    }
}
