use std::error::Error as StdError;

use crate::key::StatementKey;

/// Prepares and closes physical statements on one connection.
///
/// This is the seam between the pool and whatever actually talks to the
/// database. The pool calls `prepare` on a cache miss and `close` when a
/// statement is evicted, invalidated, or torn down with its connection.
///
/// Both methods may run inside the pool's critical section, so
/// implementations must not call back into the pool.
pub trait StatementDriver: Send + Sync + 'static {
    /// The physical prepared-statement handle.
    type Handle: Send + 'static;

    /// The error the driver reports from `prepare` and `close`.
    type Error: StdError + 'static + Send + Sync;

    /// Prepare a physical statement for `key`.
    ///
    /// The key carries the SQL text plus the catalog, schema, and creation
    /// options it is being prepared under.
    fn prepare(&self, key: &StatementKey) -> Result<Self::Handle, Self::Error>;

    /// Close a physical statement.
    ///
    /// Consumes the handle: a statement is closed at most once.
    fn close(&self, handle: Self::Handle) -> Result<(), Self::Error>;
}
