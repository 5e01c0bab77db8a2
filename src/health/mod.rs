//! Liveness detection subsystem.
//!
//! # Data Flow
//! ```text
//! Active polling (active.rs):
//!     Periodic timer
//!     → GET /health on every backend, concurrently
//!     → success/failure signal per backend
//!
//! Passive heartbeat (passive.rs):
//!     Backend pushes POST /heartbeat
//!     → receipt time recorded
//!     Periodic timer
//!     → stale receipt times aged out
//!
//! Failure detector (state.rs):
//!     Healthy ←→ Down
//!     Threshold on consecutive failures or heartbeat staleness
//! ```
//!
//! # Design Decisions
//! - Both strategies implement one `LivenessSource` and share the detector
//! - Checks run on their own task, never inline with a forwarded request
//! - Slow checks delay the next tick instead of piling up

pub mod active;
pub mod passive;
pub mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::backend::client::BackendClient;
use crate::backend::Backends;
use crate::config::{DetectionConfig, DetectionMode};
use crate::failover::FailoverController;

pub use active::ActiveProbe;
pub use passive::HeartbeatSource;

/// A strategy that turns backend liveness into detector signals.
pub trait LivenessSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run one check round and feed the outcome to `controller`.
    fn check(&self, controller: &FailoverController) -> impl Future<Output = ()> + Send;
}

/// Drives a `LivenessSource` on a fixed cadence until shutdown.
pub struct HealthMonitor<S> {
    source: S,
    controller: Arc<FailoverController>,
    interval: Duration,
}

impl<S: LivenessSource> HealthMonitor<S> {
    pub fn new(source: S, controller: Arc<FailoverController>, interval: Duration) -> Self {
        Self {
            source,
            controller,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            source = self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Health monitor starting"
        );

        // `time::interval` panics on a zero period.
        let mut ticker = time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.source.check(&self.controller).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Start the monitor selected by `config.mode`. Returns `None` when detection is disabled.
pub fn spawn_monitor(
    config: &DetectionConfig,
    controller: Arc<FailoverController>,
    backends: Backends,
    client: BackendClient,
    shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Background liveness detection disabled");
        return None;
    }

    let handle = match config.mode {
        DetectionMode::Polling => {
            let probe = ActiveProbe::new(backends, client, config.path.clone(), config.probe_timeout());
            let monitor = HealthMonitor::new(probe, controller, config.interval());
            tokio::spawn(monitor.run(shutdown))
        }
        DetectionMode::Heartbeat => {
            let monitor = HealthMonitor::new(HeartbeatSource, controller, config.interval());
            tokio::spawn(monitor.run(shutdown))
        }
    };
    Some(handle)
}
