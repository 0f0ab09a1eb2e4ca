//! Time source for the pool's recency ordering.

use std::sync::OnceLock;
use std::time::Instant;

/// A monotone instant used to order statement returns, in microseconds
/// from an arbitrary process-local epoch.
///
/// Timestamps are only ever compared with each other; they carry no
/// wall-clock meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

/// Source of the timestamps the pool orders idle statements by.
///
/// Any monotone source works. The default is [`MonotonicClock`]; tests
/// drive a [`ManualClock`][crate::testing::ManualClock] instead.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// The default [`Clock`], measuring from a process-local epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        static EPOCH: OnceLock<Instant> = OnceLock::new();

        let epoch = *EPOCH.get_or_init(Instant::now);
        let micros = Instant::now().duration_since(epoch).as_micros();
        Timestamp(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}
