//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the metrics exporter
//! - Bind the controller listener
//! - Run the HTTP server and health monitor until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A bad metrics address is logged, not fatal

use tokio::net::TcpListener;

use crate::config::FailoverConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Start the controller and block until it has shut down.
pub async fn start(config: FailoverConfig) -> Result<(), ServerError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await
}
