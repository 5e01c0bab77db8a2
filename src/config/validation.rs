//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Enforce probe timeout < probe interval
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FailoverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::FailoverConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("primary and spare must be different backends (both {0})")]
    DuplicateBackend(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("probe timeout ({timeout_ms}ms) must be shorter than the probe interval ({interval_ms}ms)")]
    ProbeTimeoutTooLong { timeout_ms: u64, interval_ms: u64 },

    #[error("health check path must start with '/': {0:?}")]
    InvalidPath(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    let primary = check_address("backends.primary", &config.backends.primary, &mut errors);
    let spare = check_address("backends.spare", &config.backends.spare, &mut errors);
    if let (Some(primary), Some(spare)) = (primary, spare) {
        if primary == spare {
            errors.push(ValidationError::DuplicateBackend(primary.to_string()));
        }
    }

    let detection = &config.detection;
    if detection.interval_ms == 0 {
        errors.push(ValidationError::Zero("detection.interval_ms"));
    }
    if detection.probe_timeout_ms == 0 {
        errors.push(ValidationError::Zero("detection.probe_timeout_ms"));
    }
    if detection.probe_timeout_ms >= detection.interval_ms && detection.interval_ms > 0 {
        errors.push(ValidationError::ProbeTimeoutTooLong {
            timeout_ms: detection.probe_timeout_ms,
            interval_ms: detection.interval_ms,
        });
    }
    if detection.failure_threshold == 0 {
        errors.push(ValidationError::Zero("detection.failure_threshold"));
    }
    if detection.heartbeat_timeout_ms == 0 {
        errors.push(ValidationError::Zero("detection.heartbeat_timeout_ms"));
    }
    if !detection.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(detection.path.clone()));
    }

    if config.forwarding.timeout_ms == 0 {
        errors.push(ValidationError::Zero("forwarding.timeout_ms"));
    }
    if config.forwarding.max_response_bytes == 0 {
        errors.push(ValidationError::Zero("forwarding.max_response_bytes"));
    }
    if config.forwarding.control_timeout_ms == 0 {
        errors.push(ValidationError::Zero("forwarding.control_timeout_ms"));
    }

    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}
