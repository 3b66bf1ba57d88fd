//! Streaming session span helper.

use std::time::Duration;

use tracing::Span;

/// Start a span covering one streaming session.
pub fn start_stream_span(capacity: usize, period: Duration, retention: Duration) -> Span {
    tracing::info_span!(
        "stream.session",
        "stream.capacity" = capacity,
        "stream.period_ms" = period.as_millis() as u64,
        "stream.retention_ms" = retention.as_millis() as u64,
    )
}
