use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use fanout_rs::config::Config;
use fanout_rs::config::secrets::ExposeSecret;
use fanout_rs::error::Error;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_apply_when_nothing_is_set() {
    let config = Config::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.dispatch.max_concurrency, 4);
    assert_eq!(config.dispatch.deadline, Duration::from_secs(10));
    assert_eq!(config.stream.capacity, 5);
    assert_eq!(config.stream.period, Duration::from_secs(1));
    assert_eq!(config.stream.retention, Duration::from_secs(5));
    assert!(config.http_token.is_none());
    assert_eq!(config.log_level, "info");
}

#[test]
fn env_values_override_defaults() {
    let config = Config::from_lookup(lookup(&[
        ("FANOUT_MAX_CONCURRENCY", "8"),
        ("FANOUT_DEADLINE_SECS", "3"),
        ("FANOUT_STREAM_PERIOD_MS", "250"),
        ("FANOUT_HTTP_TOKEN", "tok-123"),
        ("OTEL_ENDPOINT", "http://localhost:4317"),
        ("LOG_LEVEL", "debug"),
    ]))
    .unwrap();

    assert_eq!(config.dispatch.max_concurrency, 8);
    assert_eq!(config.dispatch.deadline, Duration::from_secs(3));
    assert_eq!(config.stream.period, Duration::from_millis(250));
    assert_eq!(
        config.http_token.as_ref().unwrap().expose_secret(),
        "tok-123"
    );
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn malformed_number_names_the_variable() {
    let err = Config::from_lookup(lookup(&[("FANOUT_MAX_CONCURRENCY", "lots")])).unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains("FANOUT_MAX_CONCURRENCY")),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn zero_concurrency_fails_validation() {
    let result = Config::from_lookup(lookup(&[("FANOUT_MAX_CONCURRENCY", "0")]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn token_is_redacted_in_debug_output() {
    let config = Config::from_lookup(lookup(&[("FANOUT_HTTP_TOKEN", "hunter2")])).unwrap();
    assert!(!format!("{config:?}").contains("hunter2"));
}

#[test]
fn toml_fills_nested_stream_section() {
    let config = Config::from_toml_str(
        r#"
        max_concurrency = 2
        deadline_secs = 30

        [stream]
        capacity = 10
        retention_secs = 60
        "#,
    )
    .unwrap();

    assert_eq!(config.dispatch.max_concurrency, 2);
    assert_eq!(config.dispatch.deadline, Duration::from_secs(30));
    assert_eq!(config.stream.capacity, 10);
    assert_eq!(config.stream.period, Duration::from_secs(1));
    assert_eq!(config.stream.retention, Duration::from_secs(60));
}

#[test]
fn toml_rejects_unknown_keys() {
    assert!(Config::from_toml_str("max_concurency = 2").is_err());
}

#[test]
fn load_reads_file_and_reports_path_on_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "log_level = \"warn\"").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.log_level, "warn");

    let missing = file.path().with_extension("missing");
    let err = Config::load(&missing).unwrap_err();
    assert!(err.to_string().contains("cannot read config"));
}
