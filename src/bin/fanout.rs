//! fanout CLI: crawl titles, download files, tail a synthetic log stream.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fanout_rs::config::Config;
use fanout_rs::engine::Dispatcher;
use fanout_rs::model::{ResultSet, WorkItem};
use fanout_rs::ops::{FileDownloader, HttpClient, TitleFetcher};
use fanout_rs::stream::{RandomLogSource, StreamPipeline, StreamReport};
use fanout_rs::telemetry::{TelemetryConfig, init_telemetry};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "fanout", about = "Bounded concurrent fetches and windowed streams")]
struct Cli {
    /// TOML config file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the maximum number of concurrent items
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,
    /// Override the dispatch deadline, in seconds
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch each URL and report its page title
    Crawl {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Download each URL into a directory
    Download {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Stream random log events and report the recent window
    Tail {
        /// Session length in seconds
        #[arg(long, default_value_t = 15)]
        duration: u64,
        /// Seed for a reproducible event sequence
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    if let Some(n) = cli.max_concurrency {
        config.dispatch.max_concurrency = n;
    }
    if let Some(secs) = cli.deadline_secs {
        config.dispatch.deadline = Duration::from_secs(secs);
    }
    config.validate()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "fanout".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        on_signal.cancel();
    });

    match cli.command {
        Command::Crawl { urls } => cmd_crawl(config, cancel, urls, cli.json).await,
        Command::Download { urls, dir } => {
            cmd_download(config, cancel, urls, dir, cli.json).await
        }
        Command::Tail { duration, seed } => {
            cmd_tail(config, cancel, duration, seed, cli.json).await
        }
    }
}

async fn cmd_crawl(
    config: Config,
    cancel: CancellationToken,
    urls: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let client = HttpClient::new(config.http_token)?;
    let dispatcher = Dispatcher::new(config.dispatch)?.with_cancellation(cancel);

    let items = urls.into_iter().map(WorkItem::keyed).collect();
    let results = dispatcher
        .dispatch(items, TitleFetcher::new(client))
        .await?;

    print_results(&results, json, |title| title.clone())
}

async fn cmd_download(
    config: Config,
    cancel: CancellationToken,
    urls: Vec<String>,
    dir: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&dir).await?;
    let client = HttpClient::new(config.http_token)?;
    let dispatcher = Dispatcher::new(config.dispatch)?.with_cancellation(cancel);

    let mut downloader = FileDownloader::new(client, dir, urls.len());
    if !json {
        downloader = downloader.on_progress(|done, total| {
            println!("Progress: Downloaded {done}/{total} files");
        });
    }
    let items = urls.into_iter().map(WorkItem::keyed).collect();
    let results = dispatcher.dispatch(items, downloader).await?;

    print_results(&results, json, |path| path.display().to_string())
}

async fn cmd_tail(
    config: Config,
    cancel: CancellationToken,
    duration: u64,
    seed: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let retention = config.stream.retention;
    let pipeline = StreamPipeline::new(config.stream)?.with_cancellation(cancel);
    let source = match seed {
        Some(seed) => RandomLogSource::seeded(seed),
        None => RandomLogSource::new(),
    };

    let report = pipeline
        .run_for(source, Duration::from_secs(duration))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report, retention);
    Ok(())
}

fn print_results<V>(
    results: &ResultSet<V>,
    json: bool,
    render: impl Fn(&V) -> String,
) -> anyhow::Result<()> {
    let successes: BTreeMap<String, String> = results
        .successes
        .iter()
        .map(|(k, v)| (k.to_string(), render(v)))
        .collect();
    let failures: BTreeMap<String, String> = results
        .failures
        .iter()
        .map(|(k, e)| (k.to_string(), error_chain(e)))
        .collect();

    if json {
        let out = serde_json::json!({
            "results": successes,
            "errors": failures,
            "stats": results.stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Results:");
    for (key, value) in &successes {
        println!("{key}: {value}");
    }
    println!("\nErrors:");
    for (key, err) in &failures {
        println!("{key}: {err}");
    }
    println!(
        "\n{} ok, {} failed, peak concurrency {}, {}ms",
        successes.len(),
        failures.len(),
        results.stats.peak_concurrency,
        results.stats.elapsed.as_millis()
    );
    Ok(())
}

fn print_report(report: &StreamReport, retention: Duration) {
    println!("Total ERROR logs: {}", report.counters.errors());
    println!("Recent logs (last {} seconds):", retention.as_secs());
    for event in &report.recent {
        println!(
            "{} {} {:?}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.level,
            event.message
        );
    }
}

/// Render an error with its source chain, `outer: inner: ...`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        append(&mut out, cause);
        source = cause.source();
    }
    out
}

fn append(out: &mut String, cause: impl Display) {
    let cause = cause.to_string();
    if !out.ends_with(&cause) {
        out.push_str(": ");
        out.push_str(&cause);
    }
}
