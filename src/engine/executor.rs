//! Task executor: runs one work item's operation under the shared deadline.
//!
//! Cancellation is cooperative. When the deadline passes the operation's
//! task is aborted, which takes effect at its next `.await`. An operation
//! that blocks its thread without yielding cannot be interrupted, and the
//! executor waits for it to come back before releasing its slot.
//!
//! The operation's task is owned by the executor future: dropping that
//! future (for instance when a caller abandons the whole dispatch) aborts
//! the operation as well.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, debug, warn};

use crate::error::TaskError;
use crate::model::{ExecutionResult, WorkItem};
use crate::telemetry::dispatch::start_task_span;

use super::deadline::Deadline;

/// The external call a dispatch applies to each payload.
///
/// Implementations should watch `cancel` at their suspension points and
/// return promptly once it fires. Closures of the shape
/// `Fn(P, CancellationToken) -> impl Future<Output = Result<V, E>>`
/// implement this trait.
pub trait Operation<P>: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn call(
        &self,
        payload: P,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<P, F, Fut, V, E> Operation<P> for F
where
    F: Fn(P, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
    V: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = V;
    type Error = E;

    fn call(
        &self,
        payload: P,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<V, E>> + Send {
        (self)(payload, cancel)
    }
}

/// Runs single work items for one dispatch.
pub struct TaskExecutor<O> {
    operation: Arc<O>,
    deadline: Deadline,
}

impl<O> Clone for TaskExecutor<O> {
    fn clone(&self) -> Self {
        Self {
            operation: Arc::clone(&self.operation),
            deadline: self.deadline.clone(),
        }
    }
}

impl<O> TaskExecutor<O> {
    pub fn new(operation: Arc<O>, deadline: Deadline) -> Self {
        Self {
            operation,
            deadline,
        }
    }

    /// Execute one item. Always yields exactly one result; never panics.
    pub async fn execute<P>(
        &self,
        item: WorkItem<P>,
    ) -> ExecutionResult<<O as Operation<P>>::Output>
    where
        O: Operation<P>,
        P: Send + 'static,
    {
        let WorkItem { key, payload } = item;
        let span = start_task_span(&key);

        async {
            if self.deadline.is_expired() {
                debug!("deadline passed before start");
                return ExecutionResult::Failure(self.deadline.cause());
            }

            let operation = Arc::clone(&self.operation);
            let token = self.deadline.token();
            let mut handle = AbortOnDropHandle::new(tokio::spawn(
                async move { operation.call(payload, token).await }.in_current_span(),
            ));

            let result = tokio::select! {
                biased;
                joined = &mut handle => match joined {
                    Ok(Ok(value)) => ExecutionResult::Success(value),
                    Ok(Err(e)) => ExecutionResult::Failure(TaskError::operation(e)),
                    Err(e) if e.is_panic() => {
                        ExecutionResult::Failure(TaskError::Panicked(panic_message(e.into_panic())))
                    }
                    Err(_) => ExecutionResult::Failure(self.deadline.cause()),
                },
                _ = self.deadline.expired() => {
                    handle.abort();
                    // Wait for the abort to land so the slot is not freed
                    // while the operation still runs.
                    if let Ok(Ok(_)) = handle.await {
                        debug!("operation finished as the deadline passed; result discarded");
                    }
                    ExecutionResult::Failure(self.deadline.cause())
                }
            };

            match &result {
                ExecutionResult::Success(_) => debug!("item succeeded"),
                ExecutionResult::Failure(e) => warn!(error = %e, "item failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
