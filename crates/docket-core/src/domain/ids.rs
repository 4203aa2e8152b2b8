//! Item identifiers.
//!
//! An `ItemId` is a 64-bit tick timestamp (100 ns resolution, counted from
//! 0001-01-01T00:00:00Z) plus a small disambiguation counter.
//!
//! ## Properties
//! - **Sortable by creation time**: the timestamp dominates the value.
//! - **No coordination**: any process can mint ids; collisions are rejected by
//!   the store's unique constraint and retried with the next counter.
//! - **Plain numeric order**: comparison is `u64` comparison, nothing more.
//!
//! Uniqueness assumes the wall clock never goes backwards. A rollback can
//! collide with already-issued ids until the disambiguation budget runs out.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Ticks per second (one tick is 100 ns).
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

/// Identifier of a queued item.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Raw tick value.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Timestamp-derived id with counter 0.
    ///
    /// Instants before 0001-01-01 clamp to 0, instants past the `u64` range
    /// clamp to `u64::MAX`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let ticks = i128::from(at.timestamp()) * i128::from(TICKS_PER_SECOND)
            + i128::from(at.timestamp_subsec_nanos() / 100)
            + i128::from(UNIX_EPOCH_TICKS);
        Self(ticks.clamp(0, i128::from(u64::MAX)) as u64)
    }

    /// `base + counter`, used to step past an id that is already taken.
    pub fn with_counter(base: ItemId, counter: u32) -> Self {
        Self(base.0.saturating_add(u64::from(counter)))
    }

    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Creation instant encoded in the id (the counter shows up as extra ticks).
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let since_epoch = i128::from(self.0) - i128::from(UNIX_EPOCH_TICKS);
        let secs = since_epoch.div_euclid(i128::from(TICKS_PER_SECOND));
        let rem = since_epoch.rem_euclid(i128::from(TICKS_PER_SECOND));
        Utc.timestamp_opt(i64::try_from(secs).ok()?, (rem * 100) as u32)
            .single()
    }

    /// Make a batch of ids pairwise distinct.
    ///
    /// Ids sharing a timestamp receive ascending counters in input order. The
    /// result is strictly ordered the same way the input is: if `a < b` in the
    /// input, or `a == b` and `a` comes first, then `a' < b'` in the output.
    /// Counters push an id forward until it clears every id already assigned
    /// below it, so `[t, t, t + 1]` becomes `[t, t + 1, t + 2]`.
    pub fn distinct_batch(ids: &[ItemId]) -> Vec<ItemId> {
        let mut order: Vec<usize> = (0..ids.len()).collect();
        // stable: ties keep input order
        order.sort_by_key(|&i| ids[i]);

        let mut out = vec![ItemId(0); ids.len()];
        let mut counters: HashMap<ItemId, u32> = HashMap::new();
        let mut last: Option<ItemId> = None;
        for i in order {
            let counter = counters.entry(ids[i]).or_insert(0);
            let mut next = ItemId::with_counter(ids[i], *counter);
            *counter += 1;
            if let Some(prev) = last
                && next <= prev
            {
                next = ItemId(prev.0.saturating_add(1));
            }
            out[i] = next;
            last = Some(next);
        }
        out
    }
}

impl From<u64> for ItemId {
    fn from(ticks: u64) -> Self {
        Self(ticks)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
