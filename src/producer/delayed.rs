//! Delay-queue entries.
//!
//! A [`DelayedEvent`] wraps one timed event while it sits in the buffer.
//! Entries order by `(scheduled time, insertion sequence)` ascending, so
//! events sharing a scheduled time release in the order they were enqueued —
//! the deterministic tie-break the dispatch order is documented with.

use std::cmp::Ordering;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;
use crate::events::{Event, EventKey};

/// One buffered event awaiting its scheduled moment.
#[derive(Debug)]
pub(crate) struct DelayedEvent {
    /// Scheduled moment of release.
    pub at: SystemTime,
    /// Per-producer insertion sequence; breaks ties between equal times.
    pub seq: u64,
    /// Topic the event was published under.
    pub key: EventKey,
    /// The event itself (always `Event::Timed`).
    pub event: Event,
}

impl DelayedEvent {
    pub fn new(at: SystemTime, seq: u64, key: EventKey, event: Event) -> Self {
        DelayedEvent {
            at,
            seq,
            key,
            event,
        }
    }

    /// Remaining delay against `clock`, saturating at zero once due.
    pub fn due_in(&self, clock: &Clock) -> Duration {
        self.at
            .duration_since(clock.now())
            .unwrap_or(Duration::ZERO)
    }
}

impl PartialEq for DelayedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for DelayedEvent {}

impl PartialOrd for DelayedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;
    use std::time::UNIX_EPOCH;

    fn entry(at_secs: u64, seq: u64) -> DelayedEvent {
        let at = UNIX_EPOCH + Duration::from_secs(at_secs);
        DelayedEvent::new(at, seq, EventKey::new("k"), Event::timed(at, seq))
    }

    #[test]
    fn test_orders_by_time_then_sequence() {
        assert!(entry(9, 5) < entry(10, 0));
        assert!(entry(10, 0) < entry(10, 1));
        assert_eq!(entry(10, 1), entry(10, 1));
    }

    #[test]
    fn test_min_heap_releases_earliest_first() {
        let mut heap = BinaryHeap::new();
        for e in [entry(10, 0), entry(11, 1), entry(9, 2), entry(10, 3)] {
            heap.push(Reverse(e));
        }

        let order: Vec<(u64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(e)| {
                let secs = e.at.duration_since(UNIX_EPOCH).unwrap().as_secs();
                (secs, e.seq)
            })
            .collect();
        assert_eq!(order, vec![(9, 2), (10, 0), (10, 3), (11, 1)]);
    }

    #[test]
    fn test_due_in_saturates_at_zero() {
        let clock = Clock::simulated(UNIX_EPOCH + Duration::from_secs(100));
        assert_eq!(entry(90, 0).due_in(&clock), Duration::ZERO);
        assert_eq!(entry(100, 0).due_in(&clock), Duration::ZERO);
        assert_eq!(entry(103, 0).due_in(&clock), Duration::from_secs(3));
    }
}
