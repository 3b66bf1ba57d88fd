//! Smoke tests for OTLP export against a local observability stack
//! (collector on :4317, Tempo on :3200, Prometheus on :9090).
//!
//! Run with:
//! ```sh
//! cargo test --test telemetry_smoke_test -- --ignored --nocapture
//! ```

use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use fanout_rs::engine::{DispatchConfig, Dispatcher};
use fanout_rs::model::WorkItem;
use fanout_rs::stream::{RandomLogSource, StreamConfig, StreamPipeline};
use fanout_rs::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use tokio_util::sync::CancellationToken;

const SERVICE: &str = "fanout-smoke-test";

static TELEMETRY: OnceLock<TelemetryGuard> = OnceLock::new();

fn ensure_telemetry() -> &'static TelemetryGuard {
    TELEMETRY.get_or_init(|| {
        init_telemetry(TelemetryConfig {
            endpoint: Some("http://localhost:4317".to_string()),
            service_name: SERVICE.to_string(),
            log_level: "debug".to_string(),
        })
        .expect("failed to init telemetry")
    })
}

/// Force-flush all providers and give backends time to ingest.
async fn flush_and_wait(guard: &TelemetryGuard) {
    guard.force_flush();
    tokio::time::sleep(Duration::from_secs(8)).await;
}

async fn run_workload() {
    let dispatcher = Dispatcher::new(DispatchConfig {
        max_concurrency: 2,
        deadline: Duration::from_millis(300),
    })
    .unwrap();
    let op = |n: u64, _cancel: CancellationToken| async move {
        tokio::time::sleep(Duration::from_millis(n * 50)).await;
        if n == 3 {
            return Err(io::Error::other("smoke failure"));
        }
        Ok(n)
    };
    let items = (0..8).map(|n| WorkItem::new(format!("smoke-{n}"), n)).collect();
    let results = dispatcher.dispatch(items, op).await.unwrap();
    assert_eq!(results.len(), 8);

    let pipeline = StreamPipeline::new(StreamConfig {
        period: Duration::from_millis(100),
        ..StreamConfig::default()
    })
    .unwrap();
    pipeline
        .run_for(RandomLogSource::seeded(1), Duration::from_secs(1))
        .await;
}

#[test]
#[ignore]
fn smoke_traces() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let guard = ensure_telemetry();
        run_workload().await;
        flush_and_wait(guard).await;

        let client = reqwest::Client::new();
        let resp = client
            .get("http://localhost:3200/api/search")
            .query(&[("tags", format!("service.name={SERVICE}")), ("limit", "5".into())])
            .send()
            .await
            .expect("failed to query Tempo");
        assert!(resp.status().is_success(), "Tempo query failed: {}", resp.status());

        let body: serde_json::Value = resp.json().await.expect("failed to parse Tempo response");
        let traces = body["traces"].as_array();
        assert!(
            traces.is_some_and(|t| !t.is_empty()),
            "expected traces in Tempo, got: {body}"
        );
        println!("Tempo: found {} trace(s)", traces.unwrap().len());
    });
}

#[test]
#[ignore]
fn smoke_metrics() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let guard = ensure_telemetry();
        run_workload().await;
        flush_and_wait(guard).await;

        let client = reqwest::Client::new();
        for metric in ["fanout_dispatch_items_total", "fanout_stream_events_total"] {
            let resp = client
                .get("http://localhost:9090/api/v1/query")
                .query(&[("query", metric)])
                .send()
                .await
                .expect("failed to query Prometheus");
            assert!(
                resp.status().is_success(),
                "Prometheus query failed: {}",
                resp.status()
            );

            let body: serde_json::Value = resp
                .json()
                .await
                .expect("failed to parse Prometheus response");
            let results = body["data"]["result"].as_array();
            assert!(
                results.is_some_and(|r| !r.is_empty()),
                "expected {metric} in Prometheus, got: {body}"
            );
            println!("Prometheus: {} series for {metric}", results.unwrap().len());
        }
    });
}
