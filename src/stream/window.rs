//! Sliding time window and running counters, owned by the consumer.
//!
//! Neither type is synchronized. Only the consumer task touches them; a
//! design with several consumers needs one window per consumer or a lock.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::model::{Level, StreamEvent};

/// Events in arrival order, none older than the retention period.
///
/// Eviction only ever removes a prefix: the front is popped while it is
/// stale. An event arriving out of order stays until everything ahead of
/// it has aged out.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    retention: Duration,
    events: VecDeque<StreamEvent>,
}

impl SlidingWindow {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            events: VecDeque::new(),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append `event`, then evict stale events as of `now`.
    /// Returns how many were evicted.
    pub fn push(&mut self, event: StreamEvent, now: Instant) -> usize {
        self.events.push_back(event);
        self.evict_expired(now)
    }

    /// Pop events from the front while their age has reached the
    /// retention period. Returns how many were evicted.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.events.front() {
            if front.age(now) < self.retention {
                break;
            }
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter()
    }

    pub fn into_vec(self) -> Vec<StreamEvent> {
        self.events.into()
    }
}

/// Per-level tallies of consumed events. Values only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunningCounters {
    total: u64,
    by_level: BTreeMap<Level, u64>,
}

impl RunningCounters {
    pub fn observe(&mut self, event: &StreamEvent) {
        self.total += 1;
        *self.by_level.entry(event.level).or_default() += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, level: Level) -> u64 {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    pub fn errors(&self) -> u64 {
        self.count(Level::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(seq: u64, base: Instant, secs: u64) -> StreamEvent {
        StreamEvent::new(seq, Level::Info, format!("event {seq}"))
            .created_at(base + Duration::from_secs(secs))
    }

    #[test]
    fn tenth_event_leaves_five_most_recent() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(5));

        for seq in 1..=10 {
            let now = base + Duration::from_secs(seq);
            window.push(event_at(seq, base, seq), now);
        }

        let now = base + Duration::from_secs(10);
        assert_eq!(window.len(), 5);
        assert!(window.iter().all(|e| e.age(now) <= Duration::from_secs(5)));
        let seqs: Vec<u64> = window.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn eviction_stops_at_first_fresh_event() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(5));

        // Out-of-order arrival: a stale event behind a fresh one survives
        // until the fresh one ages out.
        window.push(event_at(1, base, 8), base + Duration::from_secs(8));
        window.push(event_at(2, base, 1), base + Duration::from_secs(8));
        assert_eq!(window.len(), 2);

        let evicted = window.evict_expired(base + Duration::from_secs(13));
        assert_eq!(evicted, 2);
        assert!(window.is_empty());
    }

    #[test]
    fn counters_tally_by_level() {
        let mut counters = RunningCounters::default();
        for level in [Level::Error, Level::Info, Level::Error, Level::Warn] {
            counters.observe(&StreamEvent::new(0, level, "m"));
        }
        assert_eq!(counters.total(), 4);
        assert_eq!(counters.errors(), 2);
        assert_eq!(counters.count(Level::Warn), 1);
    }
}
