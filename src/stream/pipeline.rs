//! Streaming session: wires a producer task to the consumer over a
//! bounded queue and stops both on deadline or shutdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

use crate::error::{Error, Result};
use crate::telemetry::stream::start_stream_span;

use super::consumer::{Consumer, StreamReport};
use super::producer::run_producer;
use super::source::EventSource;
use super::window::SlidingWindow;

/// Streaming session settings. All values must be non-zero.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bounded queue capacity between producer and consumer.
    pub capacity: usize,
    /// Interval between produced events.
    pub period: Duration,
    /// Events at least this old are evicted from the window.
    pub retention: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            period: Duration::from_secs(1),
            retention: Duration::from_secs(5),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config(
                "stream capacity must be at least 1".to_string(),
            ));
        }
        if self.period.is_zero() {
            return Err(Error::Config("stream period must be non-zero".to_string()));
        }
        if self.retention.is_zero() {
            return Err(Error::Config("stream retention must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// One producer, one consumer, one sliding window.
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    config: StreamConfig,
    cancel: CancellationToken,
}

impl StreamPipeline {
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Tie this pipeline to an outer stop signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stop running sessions. They return their partial reports.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run a session that ends after `session`, on shutdown, or when the
    /// source runs dry, whichever comes first.
    pub async fn run_for<S: EventSource>(&self, source: S, session: Duration) -> StreamReport {
        self.run_inner(source, Some(session)).await
    }

    /// Run a session until shutdown or until the source runs dry.
    pub async fn run<S: EventSource>(&self, source: S) -> StreamReport {
        self.run_inner(source, None).await
    }

    async fn run_inner<S: EventSource>(
        &self,
        source: S,
        limit: Option<Duration>,
    ) -> StreamReport {
        let span = start_stream_span(
            self.config.capacity,
            self.config.period,
            self.config.retention,
        );

        async move {
            let stop = self.cancel.child_token();
            let (tx, mut rx) = mpsc::channel(self.config.capacity);
            let producer = tokio::spawn(
                run_producer(source, tx, self.config.period, stop.clone()).in_current_span(),
            );

            let consume = async {
                let consumer = Consumer::new(SlidingWindow::new(self.config.retention));
                let outcome = consumer.run(&mut rx, stop.clone()).await;
                // Producer must stop even when the consumer saw end-of-stream.
                stop.cancel();
                outcome
            };
            let timer = async {
                match limit {
                    Some(session) => {
                        tokio::select! {
                            _ = tokio::time::sleep(session) => stop.cancel(),
                            _ = stop.cancelled() => {}
                        }
                    }
                    None => stop.cancelled().await,
                }
            };
            let ((counters, window, end), ()) = tokio::join!(consume, timer);

            let produced = match producer.await {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "producer task ended abnormally");
                    counters.total()
                }
            };

            info!(
                total = counters.total(),
                errors = counters.errors(),
                retained = window.len(),
                produced,
                ?end,
                "stream session finished"
            );
            StreamReport {
                counters,
                recent: window.into_vec(),
                end,
                produced,
            }
        }
        .instrument(span)
        .await
    }
}
