//! Core data model.
//!
//! A work item is one independent unit handed to a dispatch: a key that
//! names it in the result set and a payload the operation consumes. Stream
//! events are the records flowing through the streaming pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::TaskError;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// Identifier of a work item within one dispatch.
///
/// Uniqueness is the caller's business. When two items share a key, the
/// result written last wins and the other is gone from the result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkKey(pub String);

impl WorkKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A unit of work: key plus an opaque payload.
#[derive(Debug, Clone)]
pub struct WorkItem<P> {
    pub key: WorkKey,
    pub payload: P,
}

impl<P> WorkItem<P> {
    pub fn new(key: impl Into<WorkKey>, payload: P) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

impl WorkItem<String> {
    /// Item whose key and payload are the same string, e.g. a URL.
    pub fn keyed(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: WorkKey(value.clone()),
            payload: value,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of executing one work item. Never both.
#[derive(Debug)]
pub enum ExecutionResult<V> {
    Success(V),
    Failure(TaskError),
}

impl<V> ExecutionResult<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Label used for metrics: "ok" or the failure label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::Failure(e) => e.label(),
        }
    }
}

impl<V> From<std::result::Result<V, TaskError>> for ExecutionResult<V> {
    fn from(result: std::result::Result<V, TaskError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

/// Counters describing how a dispatch went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Items handed to the dispatch.
    pub items: usize,
    /// Items that obtained a concurrency slot and started.
    pub admitted: usize,
    /// Highest number of simultaneously running items observed.
    pub peak_concurrency: usize,
    /// Wall time from start of admission to the end of draining.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// The paired success/failure maps returned by a dispatch.
///
/// Insertion order is not preserved and carries no meaning. A key appears
/// in at most one of the two maps.
#[derive(Debug)]
pub struct ResultSet<V> {
    pub successes: HashMap<WorkKey, V>,
    pub failures: HashMap<WorkKey, TaskError>,
    pub stats: DispatchStats,
}

impl<V> ResultSet<V> {
    /// Total recorded results.
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys that failed because the deadline passed.
    pub fn timed_out(&self) -> impl Iterator<Item = &WorkKey> {
        self.failures
            .iter()
            .filter(|(_, e)| e.is_deadline_exceeded())
            .map(|(k, _)| k)
    }

    pub fn into_parts(self) -> (HashMap<WorkKey, V>, HashMap<WorkKey, TaskError>) {
        (self.successes, self.failures)
    }
}

// ---------------------------------------------------------------------------
// Stream Events
// ---------------------------------------------------------------------------

/// Category of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// One record produced by a stream source. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    /// Producer sequence number, starting at 1.
    pub seq: u64,
    /// Wall-clock creation time, for display.
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    /// Monotonic creation instant; all age arithmetic uses this.
    #[serde(skip)]
    pub created: Instant,
}

impl StreamEvent {
    pub fn new(seq: u64, level: Level, message: impl Into<String>) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            level,
            message: message.into(),
            created: Instant::now(),
        }
    }

    /// Override the monotonic creation instant.
    pub fn created_at(mut self, created: Instant) -> Self {
        self.created = created;
        self
    }

    /// Age of the event as of `now`. Zero if `now` is earlier.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("error".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("debug".parse::<Level>().is_err());
    }

    #[test]
    fn keyed_item_uses_value_for_both() {
        let item = WorkItem::keyed("https://example.com");
        assert_eq!(item.key.as_str(), "https://example.com");
        assert_eq!(item.payload, "https://example.com");
    }

    #[test]
    fn event_age_saturates() {
        let now = Instant::now();
        let event = StreamEvent::new(1, Level::Info, "x").created_at(now + Duration::from_secs(3));
        assert_eq!(event.age(now), Duration::ZERO);
        assert_eq!(
            event.age(now + Duration::from_secs(5)),
            Duration::from_secs(2)
        );
    }
}
