//! Simulated primary or spare backend.
//!
//! Exits with status 1 when told to crash, so a supervisor sees it die.

use std::process::ExitCode;
use std::time::Duration;
use clap::Parser;
use tokio::net::TcpListener;
use url::Url;

use failover_proxy::backend::simulated::{ServeOutcome, SimulatedBackend};
use failover_proxy::backend::BackendId;
use failover_proxy::config::ObservabilityConfig;
use failover_proxy::lifecycle::{signals, Shutdown};
use failover_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "demo-backend")]
#[command(about = "Simulated backend that can be told to fail", long_about = None)]
struct Cli {
    /// Node name reported in responses.
    #[arg(short, long, default_value = "primary")]
    name: String,

    #[arg(short, long, default_value = "127.0.0.1:3001")]
    bind: String,

    /// Push heartbeats to this controller URL while healthy.
    #[arg(long)]
    controller: Option<Url>,

    /// Backend id used in heartbeats.
    #[arg(long, default_value = "primary")]
    heartbeat_as: BackendId,

    #[arg(long, default_value_t = 500)]
    heartbeat_interval_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&ObservabilityConfig::default());

    let listener = match TcpListener::bind(&cli.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(bind = %cli.bind, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    let backend = SimulatedBackend::new(cli.name);
    tracing::info!(node = backend.name(), address = %cli.bind, "Demo backend listening");
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if let Some(controller) = cli.controller {
        tokio::spawn(backend.clone().run_heartbeats(
            controller,
            cli.heartbeat_as,
            Duration::from_millis(cli.heartbeat_interval_ms),
            shutdown.subscribe(),
        ));
    }

    match backend.serve(listener, shutdown.subscribe()).await {
        Ok(ServeOutcome::Stopped) => ExitCode::SUCCESS,
        Ok(ServeOutcome::Crashed) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
