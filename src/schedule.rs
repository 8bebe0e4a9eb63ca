use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, Duration, Utc};

use crate::account::AccountId;

/// A pending quota reset. Ordered by due time, then by account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResetEntry {
    pub due: DateTime<Utc>,
    pub account: AccountId,
}

/// Min-queue of pending resets, earliest first.
#[derive(Debug, Default)]
pub struct ResetSchedule {
    heap: BinaryHeap<Reverse<ResetEntry>>,
}

impl ResetSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, account: AccountId, due: DateTime<Utc>) {
        self.heap.push(Reverse(ResetEntry { due, account }));
    }

    #[inline]
    pub fn peek(&self) -> Option<&ResetEntry> {
        self.heap.peek().map(|Reverse(entry)| entry)
    }

    /// Pops the earliest entry if it is due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ResetEntry> {
        match self.peek() {
            Some(entry) if entry.due <= now => self.heap.pop().map(|Reverse(entry)| entry),
            _ => None,
        }
    }

    pub fn due_for(&self, account: AccountId) -> Option<DateTime<Utc>> {
        self.heap
            .iter()
            .map(|Reverse(entry)| entry)
            .filter(|entry| entry.account == account)
            .map(|entry| entry.due)
            .min()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Next due time on the fired entry's cadence, strictly after `now`.
/// Missed slots are skipped rather than replayed.
/// Falls back to `now + interval` when the skip does not fit in a `TimeDelta`.
pub fn next_due(fired: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = interval.max(Duration::milliseconds(1));
    let next = fired + step;
    if next > now {
        return next;
    }

    let behind = (now - next).num_milliseconds();
    let slots = behind / step.num_milliseconds() + 1;
    i32::try_from(slots)
        .ok()
        .and_then(|slots| step.checked_mul(slots))
        .and_then(|skip| next.checked_add_signed(skip))
        .filter(|skipped| *skipped > now)
        .unwrap_or(now + step)
}
