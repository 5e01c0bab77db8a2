//! Passive heartbeat detection.
//!
//! # Responsibilities
//! - Accept heartbeats pushed by backends
//! - Age out backends whose last heartbeat is too old
//!
//! # Design Decisions
//! - The controller never initiates a check in this mode
//! - A backend that has not sent its first heartbeat is assumed healthy
//! - Heartbeats are refused when the controller is polling

use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendId, UnknownBackend};
use crate::config::DetectionMode;
use crate::failover::FailoverController;
use crate::health::LivenessSource;

/// Staleness check run on every tick.
pub struct HeartbeatSource;

impl LivenessSource for HeartbeatSource {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn check(&self, controller: &FailoverController) {
        // Transitions are logged by the controller.
        controller.evaluate_heartbeats();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatAck {
    pub ok: bool,
    pub from: BackendId,
    pub timestamp: u64,
}

#[derive(Debug, Error)]
pub enum HeartbeatRejected {
    #[error("missing `from` query parameter")]
    MissingSender,

    #[error(transparent)]
    UnknownSender(#[from] UnknownBackend),

    #[error("controller is in polling mode; heartbeats are not accepted")]
    PollingMode,
}

/// Record a heartbeat from `from`.
pub fn accept(
    controller: &FailoverController,
    mode: DetectionMode,
    from: Option<&str>,
) -> Result<HeartbeatAck, HeartbeatRejected> {
    if mode != DetectionMode::Heartbeat {
        return Err(HeartbeatRejected::PollingMode);
    }
    let from: BackendId = from.ok_or(HeartbeatRejected::MissingSender)?.parse()?;
    let timestamp = controller.record_heartbeat(from);
    tracing::trace!(backend = %from, timestamp, "Heartbeat received");
    Ok(HeartbeatAck {
        ok: true,
        from,
        timestamp,
    })
}
