//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the failover
//! controller. All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for the failover controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FailoverConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Primary and spare backend addresses.
    pub backends: BackendsConfig,

    /// Liveness detection settings.
    pub detection: DetectionConfig,

    /// Request forwarding settings.
    pub forwarding: ForwardingConfig,

    /// Switchover measurement window.
    pub switchover: SwitchoverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// The two routable targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Primary backend address (e.g., "127.0.0.1:3001").
    pub primary: String,

    /// Spare backend address (e.g., "127.0.0.1:3002").
    pub spare: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            primary: "127.0.0.1:3001".to_string(),
            spare: "127.0.0.1:3002".to_string(),
        }
    }
}

/// How backend liveness is learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// The controller probes each backend's health endpoint.
    #[default]
    Polling,
    /// Backends push heartbeats; the controller only ages them out.
    Heartbeat,
}

/// Liveness detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run the background detection loop.
    pub enabled: bool,

    /// Polling or heartbeat.
    pub mode: DetectionMode,

    /// Probe interval (polling) or staleness check cadence (heartbeat), in milliseconds.
    pub interval_ms: u64,

    /// Probe timeout in milliseconds. Must be shorter than `interval_ms`.
    pub probe_timeout_ms: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before a backend is declared down.
    pub failure_threshold: u32,

    /// Age after which the last heartbeat is considered stale, in milliseconds.
    pub heartbeat_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: DetectionMode::Polling,
            interval_ms: 500,
            probe_timeout_ms: 400,
            path: "/health".to_string(),
            failure_threshold: 3,
            heartbeat_timeout_ms: 2000,
        }
    }
}

impl DetectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

/// Request forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Per-attempt forwarding timeout in milliseconds.
    pub timeout_ms: u64,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum backend response body size in bytes. Larger responses are
    /// answered with 502 without counting against the backend's health.
    pub max_response_bytes: usize,

    /// Treat a transport failure towards primary as a confirmed outage.
    pub failover_on_transport_error: bool,

    /// Timeout for control calls to the primary (`/fail`, `/recover`), in milliseconds.
    pub control_timeout_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_body_bytes: 1024 * 1024,
            max_response_bytes: 16 * 1024 * 1024,
            failover_on_transport_error: true,
            control_timeout_ms: 2000,
        }
    }
}

impl ForwardingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }
}

/// Window around the failure injection used for the error rate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwitchoverConfig {
    /// Milliseconds before the injection included in the window.
    pub window_before_ms: u64,

    /// Milliseconds after the injection included in the window.
    pub window_after_ms: u64,
}

impl Default for SwitchoverConfig {
    fn default() -> Self {
        Self {
            window_before_ms: 2000,
            window_after_ms: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
