use std::error::Error as StdError;
use std::result::Result as StdResult;

/// A specialized `Result` type for stmtpool.
pub type Result<T, E = Error> = StdResult<T, E>;

/// A type-erased driver error.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Represents all the ways an operation on a statement pool can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool is at capacity and every pooled statement is checked out,
    /// so there is nothing idle to evict.
    ///
    /// This is recoverable: closing any outstanding statement frees a slot.
    /// The pool never waits for one.
    #[error("statement pool exhausted: all {max_open} slots are checked out")]
    PoolExhausted {
        /// The capacity that was hit.
        max_open: i64,
    },

    /// The statement was destroyed out from under this handle, by eviction,
    /// [`invalidate_all`][crate::pool::StatementPool::invalidate_all], or
    /// connection teardown.
    #[error("statement is closed")]
    StatementClosed,

    /// The connection's statement pool has been torn down; nothing further
    /// can be prepared through it.
    #[error("attempted to prepare a statement on a closed connection")]
    ConnectionClosed,

    /// The underlying driver failed to prepare or close a physical
    /// statement.
    #[error("error returned from the driver: {0}")]
    Driver(#[source] BoxDynError),
}

impl Error {
    #[inline]
    pub(crate) fn driver(err: impl StdError + 'static + Send + Sync) -> Self {
        Error::Driver(err.into())
    }
}
