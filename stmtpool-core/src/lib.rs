//! Core of stmtpool: keyed, capacity-bounded pooling of prepared
//! statements with LRU eviction.
//!
//! Not for direct use; see the `stmtpool` crate for details.

pub mod clock;
pub mod connection;
pub mod driver;
pub mod error;
pub mod key;
pub mod pool;
pub mod statement;
pub mod testing;

mod logging;

#[doc(inline)]
pub use self::{
    clock::{Clock, MonotonicClock, Timestamp},
    connection::PoolingConnection,
    driver::StatementDriver,
    error::{BoxDynError, Error, Result},
    key::{Concurrency, Holdability, ResultSetKind, StatementKey, StatementKind, StatementOptions},
    pool::{PoolMetricsSnapshot, PoolOptions, SlotId, StatementPool},
    statement::{LockedStatement, PooledStatement},
};
