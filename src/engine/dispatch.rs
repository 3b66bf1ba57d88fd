//! Fan-out dispatch: admit each item through the limiter, run it, record
//! its result, and wait for every admitted task before returning.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{DispatchStats, ResultSet, WorkItem};
use crate::telemetry::dispatch::{record_phase_transition, start_dispatch_span};
use crate::telemetry::metrics;

use super::aggregator::ResultAggregator;
use super::deadline::Deadline;
use super::executor::{Operation, TaskExecutor};
use super::limiter::ConcurrencyLimiter;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle of a single dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// Created, nothing admitted yet.
    Idle,
    /// Items are being admitted and spawned.
    Dispatching,
    /// Every item admitted or rejected; waiting for running tasks.
    Draining,
    /// All tasks finished and results handed off. Terminal.
    Done,
}

impl DispatchPhase {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: DispatchPhase) -> bool {
        use DispatchPhase::*;
        matches!(
            (self, to),
            (Idle, Dispatching) | (Dispatching, Draining) | (Draining, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPhase::Idle => "idle",
            DispatchPhase::Dispatching => "dispatching",
            DispatchPhase::Draining => "draining",
            DispatchPhase::Done => "done",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase tracker for one dispatch instance.
#[derive(Debug)]
pub struct DispatchRun {
    pub id: Uuid,
    phase: DispatchPhase,
    span: Span,
}

impl DispatchRun {
    pub fn new(items: usize, max_concurrency: usize) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            phase: DispatchPhase::Idle,
            span: start_dispatch_span(&id, items, max_concurrency),
        }
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    /// Move to `to`, or fail with [`Error::InvalidTransition`].
    pub fn advance(&mut self, to: DispatchPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        record_phase_transition(&self.span, self.phase.as_str(), to.as_str());
        self.phase = to;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Settings fixed for the lifetime of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on simultaneously running items. Must be at least 1.
    pub max_concurrency: usize,
    /// Time budget shared by every item, measured from the dispatch start.
    pub deadline: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            deadline: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fans work items out to a bounded set of concurrent tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Tie this dispatcher to an outer stop signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Cancel in-flight and future dispatches from this dispatcher.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run `operation` over every item and return the collected results.
    ///
    /// Configuration problems (an empty key) fail here before any task
    /// starts. Per-item failures, timeouts included, never fail the call;
    /// they land in the result set's failure map.
    pub async fn dispatch<P, O>(
        &self,
        items: Vec<WorkItem<P>>,
        operation: O,
    ) -> Result<ResultSet<<O as Operation<P>>::Output>>
    where
        O: Operation<P>,
        P: Send + 'static,
    {
        self.dispatch_shared(items, Arc::new(operation)).await
    }

    /// Like [`dispatch`](Self::dispatch) for an operation the caller keeps
    /// a handle to.
    pub async fn dispatch_shared<P, O>(
        &self,
        items: Vec<WorkItem<P>>,
        operation: Arc<O>,
    ) -> Result<ResultSet<<O as Operation<P>>::Output>>
    where
        O: Operation<P>,
        P: Send + 'static,
    {
        validate_items(&items)?;
        let limiter = ConcurrencyLimiter::new(self.config.max_concurrency)?;
        let mut run = DispatchRun::new(items.len(), limiter.capacity());
        let span = run.span.clone();

        async move {
            let total = items.len();
            let deadline = Deadline::with_parent(self.config.deadline, &self.cancel);
            let executor = TaskExecutor::new(operation, deadline.clone());
            let aggregator = Arc::new(ResultAggregator::new());
            let mut tasks = JoinSet::new();
            let mut admitted = 0usize;

            run.advance(DispatchPhase::Dispatching)?;
            for item in items {
                let permit = tokio::select! {
                    biased;
                    _ = deadline.expired() => None,
                    permit = limiter.acquire() => Some(permit?),
                };
                let Some(permit) = permit else {
                    debug!(key = %item.key, "not admitted before deadline");
                    let cause = deadline.cause();
                    metrics::dispatch_items()
                        .add(1, &[KeyValue::new("outcome", cause.label())]);
                    aggregator.record_failure(item.key, cause)?;
                    continue;
                };

                admitted += 1;
                let executor = executor.clone();
                let aggregator = Arc::clone(&aggregator);
                tasks.spawn(
                    async move {
                        let _permit = permit;
                        let key = item.key.clone();
                        let result = executor.execute(item).await;
                        metrics::dispatch_items()
                            .add(1, &[KeyValue::new("outcome", result.label())]);
                        if let Err(e) = aggregator.record(key, result) {
                            warn!(error = %e, "result not recorded");
                        }
                    }
                    .in_current_span(),
                );
            }

            run.advance(DispatchPhase::Draining)?;
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "dispatch task ended abnormally");
                }
            }

            let stats = DispatchStats {
                items: total,
                admitted,
                peak_concurrency: limiter.peak(),
                elapsed: deadline.elapsed(),
            };
            let set = aggregator.seal(stats);
            run.advance(DispatchPhase::Done)?;

            metrics::dispatch_duration_ms()
                .record(set.stats.elapsed.as_secs_f64() * 1000.0, &[]);
            info!(
                successes = set.successes.len(),
                failures = set.failures.len(),
                admitted,
                peak = set.stats.peak_concurrency,
                elapsed_ms = set.stats.elapsed.as_millis() as u64,
                "dispatch finished"
            );
            Ok::<_, Error>(set)
        }
        .instrument(span)
        .await
    }
}

/// Reject item lists the engine cannot key results for.
fn validate_items<P>(items: &[WorkItem<P>]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if item.key.as_str().trim().is_empty() {
            return Err(Error::InvalidWorkItem {
                index,
                reason: "empty key".to_string(),
            });
        }
    }
    Ok(())
}
