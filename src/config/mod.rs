//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on malformed values. Every setting
//! has a default; nothing is required. The HTTP token is wrapped in
//! secrecy::SecretString to keep it out of logs.

pub mod secrets;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::engine::DispatchConfig;
use crate::error::{Error, Result};
use crate::stream::StreamConfig;

#[derive(Debug)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub stream: StreamConfig,
    /// Bearer token sent by the HTTP operations, if set.
    pub http_token: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            stream: StreamConfig::default(),
            http_token: None,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = parsed::<usize, _>(&lookup, "FANOUT_MAX_CONCURRENCY")? {
            config.dispatch.max_concurrency = n;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "FANOUT_DEADLINE_SECS")? {
            config.dispatch.deadline = Duration::from_secs(secs);
        }
        if let Some(n) = parsed::<usize, _>(&lookup, "FANOUT_STREAM_CAPACITY")? {
            config.stream.capacity = n;
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "FANOUT_STREAM_PERIOD_MS")? {
            config.stream.period = Duration::from_millis(ms);
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "FANOUT_STREAM_RETENTION_SECS")? {
            config.stream.retention = Duration::from_secs(secs);
        }
        config.http_token = lookup("FANOUT_HTTP_TOKEN")
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        config.otel_endpoint = lookup("OTEL_ENDPOINT");
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys keep defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("bad config {}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(n) = file.max_concurrency {
            config.dispatch.max_concurrency = n;
        }
        if let Some(secs) = file.deadline_secs {
            config.dispatch.deadline = Duration::from_secs(secs);
        }
        if let Some(n) = file.stream.capacity {
            config.stream.capacity = n;
        }
        if let Some(ms) = file.stream.period_ms {
            config.stream.period = Duration::from_millis(ms);
        }
        if let Some(secs) = file.stream.retention_secs {
            config.stream.retention = Duration::from_secs(secs);
        }
        config.http_token = file.http_token;
        config.otel_endpoint = file.otel_endpoint;
        if let Some(level) = file.log_level {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        self.stream.validate()
    }
}

/// On-disk layout of the TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    max_concurrency: Option<usize>,
    deadline_secs: Option<u64>,
    stream: FileStreamConfig,
    http_token: Option<SecretString>,
    otel_endpoint: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileStreamConfig {
    capacity: Option<usize>,
    period_ms: Option<u64>,
    retention_secs: Option<u64>,
}

fn parsed<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
    }
}
