//! Victim and reuse selection over the pool's ordered idle indices.
//!
//! Both indices hold `(returned_at, slot_id)` pairs, so the lexicographic
//! order of the pair is the policy: equal timestamps fall back to the
//! slot id, which is unique, making every choice total and repeatable.

use std::collections::BTreeSet;

use crate::clock::Timestamp;
use crate::pool::slot::SlotId;

/// An entry in the idle indices: when the statement was returned, and
/// which slot it is.
pub(crate) type IdleEntry = (Timestamp, SlotId);

/// The eviction victim: the least recently returned idle statement
/// across every key, lowest slot id on a timestamp tie.
pub(crate) fn global_victim(lru: &BTreeSet<IdleEntry>) -> Option<IdleEntry> {
    lru.first().copied()
}

/// The reuse candidate within one key: the most recently returned idle
/// statement, highest slot id on a timestamp tie.
pub(crate) fn freshest(entries: &BTreeSet<IdleEntry>) -> Option<IdleEntry> {
    entries.last().copied()
}

/// Whether a pool already holding `total` statements may not admit
/// another. A negative `max_open` means unbounded.
pub(crate) fn at_capacity(total: usize, max_open: i64) -> bool {
    match usize::try_from(max_open) {
        Ok(cap) => total >= cap,
        Err(_) => false,
    }
}

/// Whether a pool holding `total` statements exceeds `max_open`, which
/// can happen after the capacity is lowered at runtime.
pub(crate) fn over_capacity(total: usize, max_open: i64) -> bool {
    match usize::try_from(max_open) {
        Ok(cap) => total > cap,
        Err(_) => false,
    }
}
