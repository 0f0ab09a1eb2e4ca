use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::driver::StatementDriver;
use crate::error::{Error, Result};
use crate::key::StatementKey;
use crate::logging::{pool_events_enabled, sql_summary};
use crate::pool::evict::{self, IdleEntry};
use crate::pool::metrics::{PoolMetrics, PoolMetricsSnapshot};
use crate::pool::options::PoolOptions;
use crate::pool::slot::{Slot, SlotId, SlotState};

/// The shared half of a [`StatementPool`][crate::pool::StatementPool],
/// owned jointly by the pool, its connection facade, and every
/// checked-out statement.
pub(crate) struct SharedPool<D: StatementDriver> {
    pub(crate) driver: D,
    clock: Arc<dyn Clock>,
    index: Mutex<PoolIndex<D::Handle>>,
    next_slot_id: AtomicU64,
    metrics: PoolMetrics,
}

/// Everything the pool lock guards.
///
/// The three idle views are coupled: a slot id in `idle` appears exactly
/// once in `lru` and exactly once in its key's `by_key` set, always as
/// the identical `(returned_at, id)` pair, with the timestamp also
/// mirrored on the slot itself. A slot id appears in at most one of
/// `active` and `idle`; a destroyed slot appears in neither.
struct PoolIndex<H> {
    /// Capacity over `active + idle`; negative means unbounded.
    max_open: i64,
    /// Idle entries per key, ordered oldest return first.
    by_key: AHashMap<StatementKey, BTreeSet<IdleEntry>>,
    /// All idle entries in the same order; the eviction scan.
    lru: BTreeSet<IdleEntry>,
    idle: AHashMap<SlotId, Arc<Slot<H>>>,
    active: AHashMap<SlotId, Arc<Slot<H>>>,
    /// Set on connection teardown; never cleared.
    closed: bool,
}

impl<H> PoolIndex<H> {
    fn new(max_open: i64) -> Self {
        PoolIndex {
            max_open,
            by_key: AHashMap::new(),
            lru: BTreeSet::new(),
            idle: AHashMap::new(),
            active: AHashMap::new(),
            closed: false,
        }
    }

    fn total(&self) -> usize {
        self.active.len() + self.idle.len()
    }

    fn freshest_for_key(&self, key: &StatementKey) -> Option<IdleEntry> {
        self.by_key.get(key).and_then(evict::freshest)
    }

    /// Unlink an idle slot from all three idle views.
    fn detach_idle(&mut self, id: SlotId) -> Option<Arc<Slot<H>>> {
        let slot = self.idle.remove(&id)?;
        let entry = (slot.returned_at(), id);

        self.lru.remove(&entry);
        if let Some(entries) = self.by_key.get_mut(&slot.key) {
            entries.remove(&entry);
            if entries.is_empty() {
                self.by_key.remove(&slot.key);
            }
        }

        Some(slot)
    }

    /// File a returned slot in all three idle views.
    fn cache(&mut self, slot: Arc<Slot<H>>, entry: IdleEntry) {
        slot.set_returned_at(entry.0);
        self.lru.insert(entry);
        self.by_key.entry(slot.key.clone()).or_default().insert(entry);
        self.idle.insert(slot.id, slot);
    }

    /// Empty every index, returning the slots that were filed in them.
    fn drain_all(&mut self) -> Vec<Arc<Slot<H>>> {
        let mut slots: Vec<_> = self.active.drain().map(|(_, slot)| slot).collect();
        slots.extend(self.idle.drain().map(|(_, slot)| slot));
        self.lru.clear();
        self.by_key.clear();
        slots
    }
}

impl<D: StatementDriver> SharedPool<D> {
    pub(crate) fn new(driver: D, options: PoolOptions) -> Arc<Self> {
        Arc::new(SharedPool {
            driver,
            clock: options.clock,
            index: Mutex::new(PoolIndex::new(options.max_open)),
            next_slot_id: AtomicU64::new(1),
            metrics: PoolMetrics::default(),
        })
    }

    /// Check a statement out for `key`.
    ///
    /// Reuses the most recently returned idle statement for the key when
    /// there is one; otherwise prepares a new physical statement, first
    /// evicting the least recently used idle statement if the pool is at
    /// capacity. Fails with [`Error::PoolExhausted`] when the pool is at
    /// capacity and nothing is idle.
    pub(crate) fn prepare(&self, key: StatementKey) -> Result<Arc<Slot<D::Handle>>> {
        let mut index = self.index.lock();

        if index.closed {
            return Err(Error::ConnectionClosed);
        }

        if let Some((_, id)) = index.freshest_for_key(&key) {
            let slot = index
                .detach_idle(id)
                .expect("BUG: keyed idle entry for a slot that is not idle");
            slot.set_state(SlotState::Active);
            index.active.insert(slot.id, Arc::clone(&slot));
            self.metrics.record_hit();
            if pool_events_enabled() {
                tracing::debug!(
                    target: "stmtpool::pool",
                    slot_id = %slot.id,
                    sql = %sql_summary(slot.key.sql()),
                    "reusing idle statement"
                );
            }
            return Ok(slot);
        }

        while evict::at_capacity(index.total(), index.max_open) {
            if !self.evict_locked(&mut index) {
                return Err(Error::PoolExhausted {
                    max_open: index.max_open,
                });
            }
        }

        // Preparing inside the critical section serializes driver calls,
        // which also guarantees the capacity holds at the driver level.
        let handle = self.driver.prepare(&key).map_err(Error::driver)?;
        let id = SlotId(self.next_slot_id.fetch_add(1, Ordering::Relaxed));
        let slot = Slot::new(id, key, self.clock.now(), handle);
        index.active.insert(id, Arc::clone(&slot));
        self.metrics.record_miss();
        if pool_events_enabled() {
            tracing::debug!(
                target: "stmtpool::pool",
                slot_id = %id,
                sql = %sql_summary(slot.key.sql()),
                "prepared new statement"
            );
        }

        Ok(slot)
    }

    /// Return a checked-out statement to the pool.
    ///
    /// If the pool no longer has room for it, because `max_open` was
    /// lowered while the statement was out, it is closed instead of
    /// cached, and a driver error from that close is returned.
    pub(crate) fn release(&self, slot: Arc<Slot<D::Handle>>) -> Result<()> {
        let mut index = self.index.lock();

        match slot.state() {
            // Teardown or invalidate_all got here first; it owns the
            // physical close.
            SlotState::Destroyed => return Ok(()),
            // Unreachable: a statement handle can only be returned once.
            SlotState::Idle => return Ok(()),
            SlotState::Active => {}
        }

        index.active.remove(&slot.id);

        if evict::at_capacity(index.total(), index.max_open) {
            slot.set_state(SlotState::Destroyed);
            tracing::debug!(
                target: "stmtpool::pool",
                slot_id = %slot.id,
                max_open = index.max_open,
                "pool over capacity; closing returned statement"
            );
            drop(index);
            return self.destroy(&slot);
        }

        let entry = (self.clock.now(), slot.id);
        slot.set_state(SlotState::Idle);
        index.cache(slot, entry);

        Ok(())
    }

    /// Destroy a checked-out statement instead of returning it.
    pub(crate) fn invalidate(&self, slot: Arc<Slot<D::Handle>>) -> Result<()> {
        let mut index = self.index.lock();

        match slot.state() {
            SlotState::Destroyed => return Ok(()),
            SlotState::Active => {
                index.active.remove(&slot.id);
            }
            SlotState::Idle => {
                index.detach_idle(slot.id);
            }
        }

        slot.set_state(SlotState::Destroyed);
        self.metrics.record_invalidations(1);
        if pool_events_enabled() {
            tracing::debug!(
                target: "stmtpool::pool",
                slot_id = %slot.id,
                sql = %sql_summary(slot.key.sql()),
                "invalidating statement"
            );
        }
        drop(index);

        // The slot is unreachable from the indices now, and the caller
        // held the only handle, so the cell cannot be contended.
        self.destroy(&slot)
    }

    /// Tear the pool down: destroy everything and refuse further
    /// prepares.
    pub(crate) fn close_all(&self) -> Result<()> {
        self.drain(true)
    }

    /// Destroy everything, checked-out statements included, but keep the
    /// pool usable for new prepares.
    pub(crate) fn invalidate_all(&self) -> Result<()> {
        self.drain(false)
    }

    fn drain(&self, mark_closed: bool) -> Result<()> {
        let mut index = self.index.lock();
        if mark_closed {
            index.closed = true;
        }
        let slots = index.drain_all();
        for slot in &slots {
            slot.set_state(SlotState::Destroyed);
        }
        drop(index);

        if !mark_closed {
            self.metrics.record_invalidations(slots.len());
        }
        if !slots.is_empty() {
            tracing::debug!(
                target: "stmtpool::pool",
                count = slots.len(),
                closing = mark_closed,
                "destroying pooled statements"
            );
        }

        // Closing happens after the pool lock is gone: an active slot's
        // cell may be held by a caller mid-execution, and that caller is
        // allowed to take the pool lock while it holds the cell.
        let mut result = Ok(());
        for slot in slots {
            if let Err(error) = self.destroy(&slot) {
                tracing::warn!(
                    target: "stmtpool::pool",
                    slot_id = %slot.id,
                    %error,
                    "failed to close statement during teardown"
                );
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    /// Lower or raise the capacity at runtime.
    ///
    /// Shrinking destroys idle statements oldest-first until the pool
    /// fits; checked-out statements drain through [`release`] instead of
    /// being cached.
    ///
    /// [`release`]: Self::release
    pub(crate) fn set_max_open(&self, max_open: i64) {
        let mut index = self.index.lock();
        index.max_open = max_open;

        while evict::over_capacity(index.total(), index.max_open) {
            if !self.evict_locked(&mut index) {
                break;
            }
        }
    }

    /// Destroy the least recently used idle statement. Returns `false`
    /// when nothing is idle.
    ///
    /// Runs entirely under the pool lock: an idle slot's cell is
    /// uncontended, because cell guards only exist for checked-out
    /// statements. A driver error from the close is logged and dropped;
    /// the slot is already unlinked, so a failed close cannot corrupt the
    /// indices.
    fn evict_locked(&self, index: &mut PoolIndex<D::Handle>) -> bool {
        let Some((_, id)) = evict::global_victim(&index.lru) else {
            return false;
        };
        let slot = index
            .detach_idle(id)
            .expect("BUG: LRU entry for a slot that is not idle");

        slot.set_state(SlotState::Destroyed);
        self.metrics.record_eviction();
        if pool_events_enabled() {
            tracing::debug!(
                target: "stmtpool::pool",
                slot_id = %slot.id,
                sql = %sql_summary(slot.key.sql()),
                "evicting least recently used statement"
            );
        }

        if let Some(handle) = slot.take_handle() {
            self.metrics.record_destroyed();
            if let Err(error) = self.driver.close(handle) {
                tracing::warn!(
                    target: "stmtpool::pool",
                    slot_id = %slot.id,
                    %error,
                    "failed to close evicted statement"
                );
            }
        }

        true
    }

    /// Physically close a slot that is already marked destroyed and
    /// unlinked from the indices. Waits on the cell if the statement is
    /// still executing somewhere.
    fn destroy(&self, slot: &Slot<D::Handle>) -> Result<()> {
        let Some(handle) = slot.take_handle() else {
            return Ok(());
        };
        self.metrics.record_destroyed();
        self.driver.close(handle).map_err(Error::driver)
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        let index = self.index.lock();
        (index.active.len(), index.idle.len())
    }

    pub(crate) fn max_open(&self) -> i64 {
        self.index.lock().max_open
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.index.lock().closed
    }

    pub(crate) fn metrics_snapshot(&self) -> PoolMetricsSnapshot {
        let (active, idle) = self.counts();
        self.metrics.snapshot(active, idle)
    }
}
