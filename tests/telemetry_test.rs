//! Integration tests for telemetry initialization and span helpers.

use std::time::Duration;

use fanout_rs::model::WorkKey;
use fanout_rs::telemetry::{self, TelemetryConfig};
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A subscriber can only be installed once per process; a second
    // install attempt may return Err, which is acceptable here.
    let config = TelemetryConfig {
        service_name: "fanout-test".to_string(),
        ..TelemetryConfig::default()
    };
    if let Ok(guard) = telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn dispatch_span_records_transition() {
    let id = Uuid::new_v4();
    let span = telemetry::dispatch::start_dispatch_span(&id, 10, 3);
    telemetry::dispatch::record_phase_transition(&span, "idle", "dispatching");
}

#[test]
fn task_and_stream_spans_create() {
    let _task = telemetry::dispatch::start_task_span(&WorkKey::from("https://example.com"));
    let _stream = telemetry::stream::start_stream_span(
        5,
        Duration::from_secs(1),
        Duration::from_secs(5),
    );
}

#[test]
fn metric_instruments_accept_records() {
    telemetry::metrics::dispatch_items().add(1, &[]);
    telemetry::metrics::dispatch_duration_ms().record(12.5, &[]);
    telemetry::metrics::limiter_waits().add(1, &[]);
    telemetry::metrics::stream_events().add(1, &[]);
    telemetry::metrics::stream_evicted().add(2, &[]);
}
