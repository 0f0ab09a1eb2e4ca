use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::clock::Timestamp;
use crate::key::StatementKey;

/// Pool-unique statement identifier.
///
/// Ids are handed out from a monotone counter and never reused; their
/// total order is the deterministic tie-break wherever two statements
/// carry the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub(crate) u64);

impl SlotId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Lifecycle of a pooled physical statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum SlotState {
    /// Checked out; exactly one `PooledStatement` refers to it.
    Active = 0,
    /// Returned to the pool; reusable and evictable.
    Idle = 1,
    /// Physically closed, or detached and queued for closing. Terminal.
    Destroyed = 2,
}

/// One physical statement plus the pool's bookkeeping for it.
///
/// `state` is a mirror so statement handles can check liveness without
/// the pool lock; it only transitions while the slot is reachable through
/// the pool's indices (under the pool lock) or after it has been detached
/// from all of them.
///
/// `handle` is the cell that serializes use and destruction of the
/// physical statement. It holds `Some` until the transition to
/// `Destroyed` takes the handle out, exactly once, for the driver to
/// close.
pub(crate) struct Slot<H> {
    pub(crate) id: SlotId,
    pub(crate) key: StatementKey,
    pub(crate) created_at: Timestamp,
    returned_at: AtomicU64,
    state: AtomicU8,
    handle: Mutex<Option<H>>,
}

impl<H> Slot<H> {
    /// A freshly prepared statement starts out Active, owned by the
    /// caller that triggered the cache miss.
    pub(crate) fn new(
        id: SlotId,
        key: StatementKey,
        created_at: Timestamp,
        handle: H,
    ) -> Arc<Self> {
        Arc::new(Slot {
            id,
            key,
            created_at,
            returned_at: AtomicU64::new(0),
            state: AtomicU8::new(SlotState::Active as u8),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            0 => SlotState::Active,
            1 => SlotState::Idle,
            _ => SlotState::Destroyed,
        }
    }

    pub(crate) fn set_state(&self, state: SlotState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// The timestamp this slot was last returned to the pool with.
    /// Meaningful only while the slot is Idle.
    pub(crate) fn returned_at(&self) -> Timestamp {
        Timestamp::from_micros(self.returned_at.load(Ordering::Acquire))
    }

    pub(crate) fn set_returned_at(&self, at: Timestamp) {
        self.returned_at.store(at.as_micros(), Ordering::Release);
    }

    /// Lock the handle cell. Blocks only while another thread is using or
    /// closing this same physical statement.
    pub(crate) fn lock_cell(&self) -> MutexGuard<'_, Option<H>> {
        self.handle.lock()
    }

    /// Take the handle out for destruction. `None` if another path
    /// already took it.
    pub(crate) fn take_handle(&self) -> Option<H> {
        self.handle.lock().take()
    }
}

impl<H> Debug for Slot<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish()
    }
}
