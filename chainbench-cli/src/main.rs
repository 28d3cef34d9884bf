//! Chainbench - EVM chain throughput benchmark orchestrator.
//!
//! Synthesizes no transactions itself; it loads a prepared batch map,
//! fires it at an RPC endpoint at maximum sustainable rate, and reports
//! the best TPS observed over a websocket block feed.
//!
//! # Usage
//!
//! ```bash
//! # Run with a config file
//! chainbench --config chainbench.toml
//!
//! # Override the RPC endpoints from the command line
//! chainbench --config chainbench.toml --rpc-url https://... --ws-url wss://...
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

mod config;
mod error;
mod persistence;
mod service;

use config::Settings;
use service::BenchService;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Chainbench - EVM chain throughput benchmark orchestrator.
#[derive(Parser, Debug)]
#[command(name = "chainbench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "CHAINBENCH_CONFIG")]
    config: String,

    /// Override the RPC HTTPS endpoint.
    #[arg(long, env = "CHAINBENCH_RPC_URL")]
    rpc_url: Option<String>,

    /// Override the websocket endpoint.
    #[arg(long, env = "CHAINBENCH_WS_URL")]
    ws_url: Option<String>,

    /// Override the prepared-batch file path.
    #[arg(long, env = "CHAINBENCH_BATCHES")]
    batches: Option<String>,

    /// Override the RPC client pool size.
    #[arg(long, env = "CHAINBENCH_POOL_SIZE")]
    pool_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, env = "CHAINBENCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, env = "CHAINBENCH_JSON_LOGS")]
    json_logs: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), config = %args.config, "Starting chainbench");

    let mut settings =
        Settings::load(&args.config).with_context(|| format!("failed to load config from {}", args.config))?;
    settings.apply_overrides(args.rpc_url, args.ws_url, args.pool_size, args.batches);
    settings.validate().context("invalid configuration")?;

    info!(
        rpc_url = %settings.rpc.rpc_url,
        ws_url = %settings.rpc.ws_url,
        pool_size = settings.rpc.pool_size,
        "Configuration loaded"
    );

    let service = BenchService::new(settings);
    let shutdown = setup_shutdown_handler();

    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                error!(error = %e, "Benchmark run failed");
                return Err(e);
            }
        }
        () = shutdown => {
            info!("Shutdown signal received");
        }
    }

    info!("Chainbench stopped");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// INITIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    }

    Ok(())
}

/// Set up graceful shutdown handling for SIGINT/SIGTERM.
async fn setup_shutdown_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
