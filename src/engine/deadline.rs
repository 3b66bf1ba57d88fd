//! Shared deadline for one dispatch: an absolute instant plus a
//! cancellation token.
//!
//! Operations receive the token and are expected to check it at their own
//! suspension points. Whoever first observes the instant passing cancels
//! the token, so every holder sees the deadline at once.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// A deadline `timeout` from now, not linked to any outer signal.
    pub fn after(timeout: Duration) -> Self {
        Self::with_parent(timeout, &CancellationToken::new())
    }

    /// A deadline `timeout` from now that also fires when `parent` is
    /// cancelled.
    pub fn with_parent(timeout: Duration, parent: &CancellationToken) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + timeout,
            token: parent.child_token(),
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    /// Token handed to operations. Cancelled once the deadline passes.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.at
    }

    /// Resolve when the instant passes or the token is cancelled.
    pub async fn expired(&self) {
        tokio::select! {
            _ = sleep_until(self.at) => self.token.cancel(),
            _ = self.token.cancelled() => {}
        }
    }

    /// The failure to record for an item cut short by this deadline.
    ///
    /// Distinguishes the instant passing from an outer cancellation, so
    /// callers can retry timeouts selectively.
    pub fn cause(&self) -> TaskError {
        if Instant::now() >= self.at {
            TaskError::DeadlineExceeded {
                elapsed: self.elapsed(),
            }
        } else {
            TaskError::Cancelled
        }
    }
}
