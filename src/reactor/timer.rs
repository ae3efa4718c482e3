// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delay-ordered timer structure used internally by [`super::Reactor`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Opaque handle returned by [`TimerMap::insert`], used to remove a timer
/// before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerId(u64);

struct TimerEntry {
    period: Duration,
    id: TimerId,
}

/// A deadline-ordered map of pending timers. Keyed by `(deadline, sequence)`
/// so that two timers firing at the identical instant are still distinctly
/// ordered and removable in O(log n) (the spec only requires O(n) removal;
/// a `BTreeMap` gives us better than that for free).
pub struct TimerMap {
    by_deadline: BTreeMap<(Instant, u64), TimerEntry>,
    by_id: std::collections::HashMap<TimerId, (Instant, u64)>,
    next_seq: u64,
    next_id: u64,
}

impl TimerMap {
    pub fn new() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            by_id: std::collections::HashMap::new(),
            next_seq: 0,
            next_id: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }

    /// Whether `id` is still pending (periodic timers remain pending across
    /// fires; one-shot timers are not after they fire).
    pub fn contains(&self, id: TimerId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Schedule a timer to first fire at `first_deadline`, and thereafter
    /// every `period` if `period` is non-zero (a one-shot timer otherwise).
    pub fn insert(&mut self, first_deadline: Instant, period: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_deadline
            .insert((first_deadline, seq), TimerEntry { period, id });
        self.by_id.insert(id, (first_deadline, seq));
        id
    }

    /// Remove a timer before it fires. No-op if it already fired (one-shot)
    /// or was already removed.
    pub fn remove(&mut self, id: TimerId) {
        if let Some(key) = self.by_id.remove(&id) {
            self.by_deadline.remove(&key);
        }
    }

    /// Fire every timer whose deadline has passed, invoking `on_fire` for
    /// each and rescheduling periodic ones. Returns the earliest remaining
    /// deadline, which upper-bounds the next `poll` timeout.
    pub fn update(&mut self, now: Instant, mut on_fire: impl FnMut(TimerId)) -> Option<Instant> {
        loop {
            let Some((&(deadline, seq), _)) = self.by_deadline.iter().next() else {
                return None;
            };
            if deadline > now {
                return Some(deadline);
            }
            let entry = self.by_deadline.remove(&(deadline, seq)).unwrap();
            self.by_id.remove(&entry.id);
            on_fire(entry.id);
            if !entry.period.is_zero() {
                let next_deadline = deadline + entry.period;
                let next_seq = self.next_seq;
                self.next_seq += 1;
                self.by_id.insert(entry.id, (next_deadline, next_seq));
                self.by_deadline.insert(
                    (next_deadline, next_seq),
                    TimerEntry {
                        period: entry.period,
                        id: entry.id,
                    },
                );
            }
        }
    }
}

impl Default for TimerMap {
    fn default() -> Self {
        Self::new()
    }
}
