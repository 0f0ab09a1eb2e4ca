use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::MutexGuard;

use crate::clock::Timestamp;
use crate::driver::StatementDriver;
use crate::error::{Error, Result};
use crate::key::StatementKey;
use crate::pool::slot::{Slot, SlotState};
use crate::pool::{SlotId, StatementPool};

const DEREF_ERR: &str = "(bug) statement already released to pool";

// The cell is checked non-empty when a guard is created and cannot be
// emptied while the guard holds the lock.
const GUARD_ERR: &str = "(bug) locked statement cell is empty";

/// A prepared statement checked out from a
/// [`StatementPool`][crate::pool::StatementPool].
///
/// Will be returned to the pool on-drop; [`close`][Self::close] does the
/// same but surfaces errors. Not `Clone`: a checked-out statement has
/// exactly one owner, which is what makes returning it at most once a
/// compile-time guarantee.
pub struct PooledStatement<D: StatementDriver> {
    slot: Option<Arc<Slot<D::Handle>>>,
    pool: StatementPool<D>,
}

impl<D: StatementDriver> PooledStatement<D> {
    pub(crate) fn new(pool: StatementPool<D>, slot: Arc<Slot<D::Handle>>) -> Self {
        PooledStatement {
            slot: Some(slot),
            pool,
        }
    }

    fn slot(&self) -> &Arc<Slot<D::Handle>> {
        self.slot.as_ref().expect(DEREF_ERR)
    }

    /// The pool-unique id of this statement.
    pub fn id(&self) -> SlotId {
        self.slot().id
    }

    /// The key this statement is pooled under.
    pub fn key(&self) -> &StatementKey {
        &self.slot().key
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        self.slot().key.sql()
    }

    /// When the physical statement was prepared.
    pub fn created_at(&self) -> Timestamp {
        self.slot().created_at
    }

    /// Whether the statement was destroyed out from under this handle by
    /// [`invalidate_all`][StatementPool::invalidate_all] or connection
    /// teardown.
    pub fn is_destroyed(&self) -> bool {
        self.slot().state() != SlotState::Active
    }

    /// Lock the physical statement for use.
    ///
    /// Fails with [`Error::StatementClosed`] once the statement has been
    /// destroyed underneath the handle; a destroyed statement is never
    /// handed back out. While the returned guard is alive, teardown paths
    /// wait for it before physically closing the statement.
    pub fn lock_handle(&self) -> Result<LockedStatement<'_, D::Handle>> {
        let slot = self.slot();

        if slot.state() != SlotState::Active {
            return Err(Error::StatementClosed);
        }

        let guard = slot.lock_cell();
        // Re-check after taking the cell: teardown may have flipped the
        // state and emptied the cell between the check and the lock.
        if guard.is_none() {
            return Err(Error::StatementClosed);
        }

        Ok(LockedStatement { guard })
    }

    /// Return the statement to the pool.
    ///
    /// The physical statement stays open and cached for the next
    /// [`prepare`][StatementPool::prepare] of the same key, unless the
    /// pool has shrunk below its contents, in which case it is closed
    /// and a driver error from that close is surfaced here.
    pub fn close(mut self) -> Result<()> {
        let slot = self.slot.take().expect(DEREF_ERR);
        self.pool.0.release(slot)
    }

    /// Close the physical statement instead of returning it to the pool.
    ///
    /// For statements the driver has reported broken; the pool will
    /// prepare a fresh one on the next request for the key.
    pub fn invalidate(mut self) -> Result<()> {
        let slot = self.slot.take().expect(DEREF_ERR);
        self.pool.0.invalidate(slot)
    }
}

impl<D: StatementDriver> Drop for PooledStatement<D> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            if let Err(error) = self.pool.0.release(slot) {
                tracing::warn!(
                    target: "stmtpool::pool",
                    %error,
                    "error returning statement to pool"
                );
            }
        }
    }
}

impl<D: StatementDriver> Debug for PooledStatement<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledStatement")
            .field("id", &self.slot().id)
            .field("sql", &self.sql())
            .finish()
    }
}

/// Exclusive access to the physical statement handle, returned by
/// [`PooledStatement::lock_handle`].
///
/// Dereferences to the driver's handle type.
pub struct LockedStatement<'a, H> {
    guard: MutexGuard<'a, Option<H>>,
}

impl<H> Deref for LockedStatement<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.guard.as_ref().expect(GUARD_ERR)
    }
}

impl<H> DerefMut for LockedStatement<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.guard.as_mut().expect(GUARD_ERR)
    }
}
