//! Failover controller
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing::Forwarder ──▶ primary | spare
//!                    │                   │
//!                    │ admin API         │ attempts, signals
//!                    ▼                   ▼
//!              failover::FailoverController ◀── health::HealthMonitor
//!                (machine, detector, log)        (polling | heartbeat)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use clap::Parser;

use failover_proxy::config::{load_config, FailoverConfig};
use failover_proxy::lifecycle::startup;
use failover_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "failover-proxy")]
#[command(about = "Primary/spare failover controller", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used without it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failover-proxy: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => FailoverConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "failover-proxy starting"
    );

    if let Err(e) = startup::start(config).await {
        tracing::error!(error = %e, "Controller failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
