//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_forward_attempts_total` (counter): attempts by backend, outcome
//! - `failover_forward_duration_seconds` (histogram): attempt latency by backend
//! - `failover_backend_health` (gauge): 1=healthy, 0=down
//! - `failover_switchovers_total` (counter): primary → spare transitions
//! - `failover_active_target` (gauge): 0=primary, 1=spare
//!
//! # Design Decisions
//! - Prometheus exporter runs on its own listener, separate from the controller API
//! - Labels are static strings (backend id, outcome)

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::backend::BackendId;
use crate::switchover::AttemptStatus;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

fn outcome(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Http(code) if code >= 500 => "server_error",
        AttemptStatus::Http(_) => "ok",
        AttemptStatus::Timeout => "timeout",
        AttemptStatus::Error => "error",
    }
}

pub fn record_forward(backend: BackendId, status: AttemptStatus, latency: Duration) {
    metrics::counter!(
        "failover_forward_attempts_total",
        "backend" => backend.as_str(),
        "outcome" => outcome(status)
    )
    .increment(1);
    metrics::histogram!("failover_forward_duration_seconds", "backend" => backend.as_str())
        .record(latency.as_secs_f64());
}

pub fn record_backend_health(backend: BackendId, healthy: bool) {
    metrics::gauge!("failover_backend_health", "backend" => backend.as_str())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_switchover() {
    metrics::counter!("failover_switchovers_total").increment(1);
}

pub fn record_active_target(backend: BackendId) {
    let value = match backend {
        BackendId::Primary => 0.0,
        BackendId::Spare => 1.0,
    };
    metrics::gauge!("failover_active_target").set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome(AttemptStatus::Http(200)), "ok");
        assert_eq!(outcome(AttemptStatus::Http(404)), "ok");
        assert_eq!(outcome(AttemptStatus::Http(503)), "server_error");
        assert_eq!(outcome(AttemptStatus::Timeout), "timeout");
        assert_eq!(outcome(AttemptStatus::Error), "error");
    }
}
