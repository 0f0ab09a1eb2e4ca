use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::clock::{Clock, MonotonicClock};
use crate::driver::StatementDriver;
use crate::pool::inner::SharedPool;
use crate::pool::StatementPool;

/// Configuration for a [`StatementPool`].
///
/// See the source of [`PoolOptions::new()`] for current defaults.
pub struct PoolOptions {
    pub(crate) max_open: i64,
    pub(crate) clock: Arc<dyn Clock>,
}

impl PoolOptions {
    pub fn new() -> Self {
        PoolOptions {
            // cache up to 100 statements per connection, the usual
            // driver-side statement cache default
            max_open: 100,
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Set the maximum number of statements this pool keeps open at once,
    /// checked-out and idle together.
    ///
    /// A negative value means unbounded; zero means nothing may be
    /// prepared at all. The bound can be changed later with
    /// [`StatementPool::set_max_open`].
    pub fn max_open(mut self, max_open: i64) -> Self {
        self.max_open = max_open;
        self
    }

    /// Replace the clock the pool orders idle statements by.
    ///
    /// Tests use this with a
    /// [`ManualClock`][crate::testing::ManualClock] to make recency
    /// deterministic.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Create the pool described by these options around `driver`.
    pub fn build<D: StatementDriver>(self, driver: D) -> StatementPool<D> {
        StatementPool(SharedPool::new(driver, self))
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for PoolOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("max_open", &self.max_open)
            .finish()
    }
}
