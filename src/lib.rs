//! Keyed, capacity-bounded pooling of prepared statements with LRU
//! eviction, scoped to a single SQL connection.
//!
//! Repeated prepares of the same SQL, under the same catalog, schema,
//! and creation options, hand back one pooled physical statement
//! instead of re-preparing it. The pool holds at most `max_open`
//! statements; admitting a new one past the bound evicts the least
//! recently returned idle statement, and when everything is checked out
//! the prepare fails immediately instead of waiting.
//!
//! ```
//! use stmtpool::testing::MockDriver;
//! use stmtpool::{PoolOptions, PoolingConnection};
//!
//! # fn main() -> stmtpool::Result<()> {
//! let conn = PoolingConnection::with_options(
//!     MockDriver::new(),
//!     PoolOptions::new().max_open(8),
//! );
//!
//! let stmt = conn.prepare("SELECT name FROM users WHERE id = ?")?;
//! let first = stmt.lock_handle()?.physical_id();
//! stmt.close()?;
//!
//! // Same SQL, same physical statement.
//! let stmt = conn.prepare("SELECT name FROM users WHERE id = ?")?;
//! assert_eq!(stmt.lock_handle()?.physical_id(), first);
//! # Ok(())
//! # }
//! ```
//!
//! The driver seam is [`StatementDriver`]; implement it over your
//! database library to pool its statements.

// Modules
pub use stmtpool_core::{clock, connection, driver, error, key, pool, statement, testing};

// Types
pub use stmtpool_core::{
    BoxDynError, Clock, Concurrency, Error, Holdability, LockedStatement, MonotonicClock,
    PoolMetricsSnapshot, PoolOptions, PooledStatement, PoolingConnection, Result, ResultSetKind,
    SlotId, StatementDriver, StatementKey, StatementKind, StatementOptions, StatementPool,
    Timestamp,
};
