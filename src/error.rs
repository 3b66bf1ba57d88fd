//! Error types for fanout-rs.
//!
//! [`Error`] covers failures of the engine itself (bad configuration,
//! illegal lifecycle transitions). Per-item failures never surface here;
//! they are recorded as [`TaskError`] values in a result set.

use std::time::Duration;

use thiserror::Error;

use crate::engine::DispatchPhase;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid work item at position {index}: {reason}")]
    InvalidWorkItem { index: usize, reason: String },

    #[error("invalid dispatch transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: DispatchPhase,
        to: DispatchPhase,
    },

    #[error("result aggregator is sealed; late write for {key} rejected")]
    AggregatorSealed { key: String },

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single work item did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The operation itself reported an error.
    #[error("operation failed: {0}")]
    Operation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The shared deadline passed before the item finished (or started).
    #[error("deadline exceeded after {}ms", elapsed.as_millis())]
    DeadlineExceeded { elapsed: Duration },

    /// The dispatch was cancelled from outside before the item finished.
    #[error("cancelled")]
    Cancelled,

    /// The operation panicked. Only this item is affected.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap an operation error, keeping it as the source.
    pub fn operation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Operation(Box::new(err))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Short label used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Operation(_) => "error",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::Panicked(_) => "panicked",
        }
    }
}
