//! # Segwatch - network segmentation detector
//!
//! Decides whether this node still belongs to a healthy cluster segment by
//! probing configured peer hosts, and reports the verdict so the host process
//! can keep serving, step aside, or shut down before split-brain sets in.
//!
//! ## Architecture
//! ```text
//! monitor / HTTP ──▶ SegmentationCoordinator ──AND──▶ verdict
//!                         │
//!                         ├─▶ ReachabilityResolver ──▶ probe(host) x N
//!                         └─▶ ReachabilityResolver ──▶ probe(host) x M
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use segwatch_common::{SegmentReport, SegmentationPolicy};
use segwatch_common::constants::exit_codes;

mod config;
mod coordinator;
mod monitor;
mod resolver;
mod routes;
mod state;

use config::AppConfig;
use monitor::{MonitorExit, monitor_worker};
use resolver::EchoProbe;
use state::{AppState, build_coordinator};

/// Segwatch - network segmentation detector
#[derive(Parser, Debug)]
#[command(name = "segwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/segwatch.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Seconds between segmentation checks (overrides config)
    #[arg(short, long, env = "SEGWATCH_CHECK_INTERVAL")]
    interval: Option<u64>,

    /// Reaction to segmentation: noop or stop (overrides config)
    #[arg(long, env = "SEGWATCH_POLICY")]
    policy: Option<SegmentationPolicy>,

    /// Run a single check, print the report and exit (0 valid, 2 segmented)
    #[arg(long, default_value = "false")]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up .env before clap reads env fallbacks
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🛰️ Starting Segwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    // Build resolvers; a bad host list stops us here
    let coordinator = Arc::new(
        build_coordinator(&config, Arc::new(EchoProbe))
            .context("Invalid resolver configuration")?,
    );

    if args.once {
        let report = coordinator.check().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        std::process::exit(exit_code(&report));
    }

    // Create shutdown broadcast channel
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn the periodic monitor
    let monitor = tokio::spawn(monitor_worker(
        coordinator.clone(),
        config.check_interval(),
        config.segmentation_policy,
        shutdown_tx.clone(),
    ));

    // Build router
    let state = AppState::new(config.clone(), coordinator);
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Segwatch listening on {}", config.listen_addr);

    // Stop on Ctrl+C, or when the monitor asks for it
    let shutdown_signal = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("🛑 Shutdown signal received");
                let _ = shutdown_tx.send(());
            }
            _ = shutdown_rx.recv() => {}
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    let exit = monitor.await.context("Segmentation monitor panicked")?;

    info!("👋 Segwatch shutdown complete");

    if exit == MonitorExit::Segmented {
        std::process::exit(exit_codes::SEGMENTED);
    }
    Ok(())
}

/// Process exit status for a one-shot check
fn exit_code(report: &SegmentReport) -> i32 {
    if report.valid {
        exit_codes::VALID
    } else {
        exit_codes::SEGMENTED
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install JSON subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to install subscriber")?;
    }

    Ok(())
}
