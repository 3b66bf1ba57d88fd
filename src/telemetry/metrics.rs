//! Metric instrument factories for fanout-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"fanout-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for fanout-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("fanout-rs")
}

/// Counter: work items that reached a result.
/// Labels: `outcome` ("ok" | "error" | "deadline_exceeded" | "cancelled" | "panicked").
pub fn dispatch_items() -> Counter<u64> {
    meter()
        .u64_counter("fanout.dispatch.items")
        .with_description("Work items recorded by dispatches")
        .build()
}

/// Histogram: dispatch wall time in milliseconds.
pub fn dispatch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("fanout.dispatch.duration_ms")
        .with_description("Dispatch duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: admissions that had to wait for a free slot.
pub fn limiter_waits() -> Counter<u64> {
    meter()
        .u64_counter("fanout.limiter.waits")
        .with_description("Admissions that waited on a full limiter")
        .build()
}

/// Counter: stream events consumed.
/// Labels: `level`.
pub fn stream_events() -> Counter<u64> {
    meter()
        .u64_counter("fanout.stream.events")
        .with_description("Stream events consumed")
        .build()
}

/// Counter: stream events evicted from the sliding window.
pub fn stream_evicted() -> Counter<u64> {
    meter()
        .u64_counter("fanout.stream.evicted")
        .with_description("Stream events aged out of the window")
        .build()
}
