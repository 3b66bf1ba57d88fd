//! Consumer loop: counts each event, appends it to the window, and trims
//! the window on every append.

use opentelemetry::KeyValue;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::model::StreamEvent;
use crate::telemetry::metrics;

use super::window::{RunningCounters, SlidingWindow};

/// Why a streaming session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// The producer closed the queue.
    Exhausted,
    /// The session deadline or stop signal fired first.
    Cancelled,
}

/// What a session leaves behind: counters plus the window contents.
///
/// A cancelled session still carries everything consumed up to that
/// point; cancellation is not an error.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub counters: RunningCounters,
    /// Window contents in arrival order.
    pub recent: Vec<StreamEvent>,
    pub end: StreamEnd,
    /// Events the producer delivered onto the queue.
    pub produced: u64,
}

/// Single-writer owner of the window and counters.
#[derive(Debug)]
pub struct Consumer {
    window: SlidingWindow,
    counters: RunningCounters,
}

impl Consumer {
    pub fn new(window: SlidingWindow) -> Self {
        Self {
            window,
            counters: RunningCounters::default(),
        }
    }

    /// Apply one event as of `now`.
    pub fn consume(&mut self, event: StreamEvent, now: Instant) {
        trace!(seq = event.seq, level = %event.level, "consumed");
        metrics::stream_events().add(1, &[KeyValue::new("level", event.level.as_str())]);
        self.counters.observe(&event);

        let evicted = self.window.push(event, now);
        if evicted > 0 {
            metrics::stream_evicted().add(evicted as u64, &[]);
        }
    }

    pub fn counters(&self) -> &RunningCounters {
        &self.counters
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Read until the queue closes or `stop` fires.
    pub async fn run(
        mut self,
        rx: &mut mpsc::Receiver<StreamEvent>,
        stop: CancellationToken,
    ) -> (RunningCounters, SlidingWindow, StreamEnd) {
        let end = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break StreamEnd::Cancelled,
                received = rx.recv() => match received {
                    Some(event) => self.consume(event, Instant::now()),
                    None => break StreamEnd::Exhausted,
                },
            }
        };

        debug!(
            total = self.counters.total(),
            retained = self.window.len(),
            ?end,
            "consumer stopped"
        );
        (self.counters, self.window, end)
    }
}
