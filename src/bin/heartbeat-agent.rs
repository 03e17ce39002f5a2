//! # Worker Heartbeat Agent
//!
//! Publishes this host's CPU and memory usage as the load record of one scan
//! worker until interrupted. The worker reads as online for as long as the
//! agent keeps publishing.

use anyhow::Context;
use clap::Parser;
use scanner_core::config::ConfigManager;
use scanner_core::liveness::{
    HeartbeatPublisher, LivenessProvider, SystemLoadSampler, WorkerLoadTracker,
};
use scanner_core::logging::init_structured_logging;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "heartbeat-agent")]
#[command(about = "Publish worker load heartbeats to the liveness store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Worker id the heartbeats are published for
    #[arg(short, long)]
    worker_id: i64,

    /// Service configuration file (default: SCANNER_CONFIG_PATH or config/scanner.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured heartbeat interval, in seconds
    #[arg(long)]
    interval_seconds: Option<u64>,

    /// Publish a single heartbeat and exit
    #[arg(long)]
    once: bool,

    /// Delete the worker's load record on exit so it reads offline immediately
    #[arg(long)]
    deregister: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from_path(path),
        None => ConfigManager::load(),
    }
    .context("failed to load service configuration")?;
    let config = manager.config();

    let provider =
        LivenessProvider::from_config_graceful(&config.liveness, Some(&config.circuit_breaker))
            .await;
    if !provider.is_enabled() {
        warn!(
            provider = provider.provider_name(),
            "Liveness store disabled, worker will read as offline"
        );
    }

    let tracker = WorkerLoadTracker::with_ttl(provider, config.liveness.ttl());
    let interval = cli
        .interval_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.liveness.heartbeat_interval());
    if interval.is_zero() || interval >= tracker.ttl() {
        anyhow::bail!(
            "heartbeat interval {:?} must be non-zero and shorter than the record TTL {:?}",
            interval,
            tracker.ttl()
        );
    }

    let publisher = Arc::new(
        HeartbeatPublisher::new(cli.worker_id, tracker.clone(), SystemLoadSampler::new())
            .with_interval(interval),
    );

    if cli.once {
        let stored = publisher.publish_once().await;
        info!(worker_id = cli.worker_id, stored, "Single heartbeat published");
        if !stored {
            anyhow::bail!("heartbeat for worker {} was not stored", cli.worker_id);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = publisher.spawn(shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(worker_id = cli.worker_id, "Shutdown signal received");
    let _ = shutdown_tx.send(());

    let published = handle.await.context("heartbeat task failed")?;
    info!(worker_id = cli.worker_id, published, "Heartbeat agent stopped");

    if cli.deregister && tracker.delete(cli.worker_id).await {
        info!(worker_id = cli.worker_id, "Worker load record removed");
    }

    Ok(())
}
