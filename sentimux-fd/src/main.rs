//! Sentiment fusion daemon (sentimux-fd) - Main entry point
//!
//! Wires exactly one process-wide pipeline at startup: configuration store,
//! hot-reload watcher, trend store, aggregation ring, and broadcast hub.
//! Judgment sets arrive as NDJSON on stdin (one JSON array of
//! `{modality, label, confidence}` objects per line) — the thinnest stand-in
//! for the external per-modality classifiers, which are out of scope here.
//! Fused results are written to stdout as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentimux_common::types::ModalityJudgment;
use sentimux_fd::config::{spawn_reload_watcher, ConfigStore, FusionConfig};
use sentimux_fd::pipeline::{Pipeline, PipelineOptions};
use sentimux_fd::trend::TrendStore;

/// Command-line arguments for sentimux-fd
#[derive(Parser, Debug)]
#[command(name = "sentimux-fd")]
#[command(about = "Sentiment fusion daemon for SENTIMUX")]
#[command(version)]
struct Args {
    /// Path to the TOML fusion config (built-in defaults if omitted)
    #[arg(short, long, env = "SENTIMUX_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the trend database
    #[arg(short, long, default_value = "sentimux.db", env = "SENTIMUX_DB")]
    database: PathBuf,

    /// Environment overlay to merge (e.g. "staging", "production")
    #[arg(short, long, env = "SENTIMUX_ENV")]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentimux_fd=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting SENTIMUX fusion daemon");

    let config = FusionConfig::load_or_default(args.config.as_deref(), args.environment.as_deref());
    let store = Arc::new(ConfigStore::new(config));

    let trend = TrendStore::open(&args.database)
        .await
        .context("Failed to open trend database")?;

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        PipelineOptions::default(),
        Some(Arc::new(trend)),
    ));
    info!("Pipeline initialized");

    // Hot-reload watcher, cancellable at shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = args.config.clone().map(|path| {
        spawn_reload_watcher(
            Arc::clone(&store),
            path,
            Arc::clone(pipeline.hub()),
            shutdown_rx,
        )
    });

    tokio::select! {
        result = ingest_stdin(Arc::clone(&pipeline)) => {
            if let Err(e) = result {
                warn!("Stdin ingestion ended: {}", e);
            } else {
                info!("Input exhausted");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Stop the watcher; in-flight trend writes are not awaited (accepted
    // bounded-loss window for best-effort telemetry)
    let _ = shutdown_tx.send(true);
    if let Some(handle) = watcher {
        let _ = handle.await;
    }

    let stats = pipeline.hub_stats();
    info!(
        "Shutdown complete ({} subscribers, {} dropped events)",
        stats.active_subscribers, stats.dropped_events
    );
    Ok(())
}

/// Read judgment sets from stdin, one JSON array per line
async fn ingest_stdin(pipeline: Arc<Pipeline>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Vec<ModalityJudgment>>(&line) {
            Ok(judgments) => {
                let result = pipeline.ingest(&judgments);
                serde_json::to_writer(&mut stdout, &result)?;
                use std::io::Write;
                writeln!(stdout)?;
            }
            Err(e) => {
                // Malformed input never halts the pipeline
                warn!("Skipping malformed judgment line: {}", e);
            }
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
