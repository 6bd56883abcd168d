//! Veristream worker daemon
//!
//! Pulls verification jobs from the configured broker streams, runs them
//! through the inference collaborator and delivers results to each job's
//! callback endpoint. Exits non-zero only on startup configuration errors;
//! runtime failures are logged and retried, never fatal.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use veristream_domain::{ImageForensicJob, ImageMlJob, JobKind, TextJob};
use veristream_worker::processor::{HttpProcessor, Processor, TokenPool};
use veristream_worker::{SourceConfig, WorkerConfig, WorkerRuntime};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Text,
    ImageForensic,
    ImageMl,
}

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Job kind this worker instance handles
    #[arg(long, value_enum, env = "WORKER_KIND", default_value = "text")]
    kind: Kind,

    /// Comma-separated broker URLs; each URL is polled as an independent
    /// source
    #[arg(long, env = "REDIS_URLS")]
    redis_urls: Option<String>,

    /// Consumer group name
    #[arg(long, env = "CONSUMER_GROUP")]
    group: Option<String>,

    /// Consumer name; keep stable across restarts so pending entries from a
    /// crashed instance can be reclaimed
    #[arg(long, env = "CONSUMER_NAME")]
    consumer: Option<String>,

    /// Stream key override
    #[arg(long, env = "STREAM_KEY")]
    stream_key: Option<String>,

    /// Secret for HMAC-signing callback payloads
    #[arg(long, env = "CALLBACK_HMAC_SECRET")]
    hmac_secret: Option<String>,

    /// Inference endpoint URL
    #[arg(long, env = "INFERENCE_ENDPOINT")]
    inference_endpoint: Option<String>,

    /// Comma-separated inference API tokens, rotated on rejection
    #[arg(long, env = "INFERENCE_TOKENS")]
    inference_tokens: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "WORKER_CONFIG")]
    config: Option<String>,

    /// Print metrics interval (seconds)
    #[arg(long, env = "METRICS_INTERVAL", default_value = "60")]
    metrics_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .json()
        .init();

    let args = Args::parse();

    let mut config = WorkerConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(urls) = &args.redis_urls {
        config.sources = SourceConfig::from_url_list(urls);
    }
    if let Some(group) = args.group {
        config.group = group;
    }
    if let Some(consumer) = args.consumer {
        config.consumer = consumer;
    }
    if args.stream_key.is_some() {
        config.stream_key = args.stream_key;
    }
    if args.hmac_secret.is_some() {
        config.callback.hmac_secret = args.hmac_secret;
    }
    if args.inference_endpoint.is_some() {
        config.inference.endpoint = args.inference_endpoint;
    }
    if let Some(tokens) = &args.inference_tokens {
        config.inference.tokens = tokens
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
    }

    info!(
        kind = ?args.kind,
        sources = config.sources.len(),
        group = %config.group,
        consumer = %config.consumer,
        "starting veristream worker"
    );

    match args.kind {
        Kind::Text => run::<TextJob>(config, args.metrics_interval).await,
        Kind::ImageForensic => run::<ImageForensicJob>(config, args.metrics_interval).await,
        Kind::ImageMl => run::<ImageMlJob>(config, args.metrics_interval).await,
    }
}

async fn run<K: JobKind>(config: WorkerConfig, metrics_interval: u64) -> Result<()> {
    let tokens = TokenPool::new(config.inference.tokens.clone());
    let processor: Arc<dyn Processor<K::Payload>> =
        Arc::new(HttpProcessor::new(&config.inference, tokens)?);

    let runtime = WorkerRuntime::<K>::new(config, processor)?;
    let metrics = runtime.metrics().clone();
    let shutdown = runtime.shutdown_handle();

    // Setup graceful shutdown
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("received shutdown signal");
        let _ = shutdown.send(true);
    });

    // Start metrics reporting
    let metrics_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let snapshot = metrics.snapshot();
            info!(
                jobs_processed = snapshot.jobs_processed,
                jobs_succeeded = snapshot.jobs_succeeded,
                jobs_failed = snapshot.jobs_failed,
                jobs_recovered = snapshot.jobs_recovered,
                callbacks_failed = snapshot.callbacks_failed,
                avg_duration_ms = snapshot
                    .average_duration
                    .map(|d| d.as_millis())
                    .unwrap_or(0),
                "worker metrics"
            );
        }
    });

    let result = runtime.run().await;
    metrics_handle.abort();

    info!("worker shutting down gracefully");
    result
}
