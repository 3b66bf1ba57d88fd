//! Dispatch span helpers.
//!
//! Provides span creation and phase-transition recording for dispatches
//! and the items flowing through them.

use tracing::Span;
use uuid::Uuid;

use crate::model::WorkKey;

/// Start a span covering one dispatch call.
pub fn start_dispatch_span(dispatch_id: &Uuid, items: usize, max_concurrency: usize) -> Span {
    tracing::info_span!(
        "dispatch",
        "dispatch.id" = %dispatch_id,
        "dispatch.items" = items,
        "dispatch.max_concurrency" = max_concurrency,
    )
}

/// Record a phase transition as an event scoped to the given span.
pub fn record_phase_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "phase_transition");
    });
}

/// Start a span for executing a single work item.
pub fn start_task_span(key: &WorkKey) -> Span {
    tracing::debug_span!("dispatch.task", "work.key" = %key)
}
