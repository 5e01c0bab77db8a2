//! Backend health state machine (failure detector).
//!
//! # States
//! - Healthy: backend is eligible for traffic
//! - Down: backend declared failed
//!
//! # State Transitions
//! ```text
//! Healthy → Down: consecutive failures >= threshold
//!                 or last heartbeat older than heartbeat timeout
//!                 or an outage confirmed by the forwarding path
//! Down → Healthy: first clean signal (success or heartbeat)
//! ```
//!
//! # Design Decisions
//! - Transitions are returned exactly once; repeated failures while Down emit nothing
//! - A backend that never sent a heartbeat is in its grace period, not Down
//! - Reset clears counters and status but keeps heartbeat receipt times

use std::time::Duration;
use serde::Serialize;

use crate::backend::BackendId;

/// Health status of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Down,
}

/// Per-backend health record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub consecutive_failures: u32,
    pub last_heartbeat_at: Option<u64>,
    pub status: HealthStatus,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_heartbeat_at: None,
            status: HealthStatus::Healthy,
        }
    }
}

impl HealthState {
    pub fn is_down(&self) -> bool {
        self.status == HealthStatus::Down
    }
}

/// Outcome of one liveness check or forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Success,
    Failure,
}

/// A change in a backend's health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub backend: BackendId,
    pub status: HealthStatus,
}

impl Transition {
    fn down(backend: BackendId) -> Self {
        Self { backend, status: HealthStatus::Down }
    }

    fn up(backend: BackendId) -> Self {
        Self { backend, status: HealthStatus::Healthy }
    }
}

/// Consumes liveness signals and decides when a backend is down.
#[derive(Debug, Clone)]
pub struct FailureDetector {
    threshold: u32,
    heartbeat_timeout_ms: u64,
    primary: HealthState,
    spare: HealthState,
}

impl FailureDetector {
    pub fn new(threshold: u32, heartbeat_timeout: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            heartbeat_timeout_ms: heartbeat_timeout.as_millis() as u64,
            primary: HealthState::default(),
            spare: HealthState::default(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn state(&self, backend: BackendId) -> &HealthState {
        match backend {
            BackendId::Primary => &self.primary,
            BackendId::Spare => &self.spare,
        }
    }

    fn state_mut(&mut self, backend: BackendId) -> &mut HealthState {
        match backend {
            BackendId::Primary => &mut self.primary,
            BackendId::Spare => &mut self.spare,
        }
    }

    /// Apply one success/failure signal.
    pub fn observe(&mut self, backend: BackendId, signal: Signal) -> Option<Transition> {
        let threshold = self.threshold;
        let state = self.state_mut(backend);
        match signal {
            Signal::Success => {
                state.consecutive_failures = 0;
                if state.is_down() {
                    state.status = HealthStatus::Healthy;
                    return Some(Transition::up(backend));
                }
                None
            }
            Signal::Failure => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if !state.is_down() && state.consecutive_failures >= threshold {
                    state.status = HealthStatus::Down;
                    return Some(Transition::down(backend));
                }
                None
            }
        }
    }

    /// Declare a backend down immediately.
    ///
    /// The counter is raised to the threshold so that "down" keeps meaning
    /// "threshold reached since the last success".
    pub fn confirm_down(&mut self, backend: BackendId) -> Option<Transition> {
        let threshold = self.threshold;
        let state = self.state_mut(backend);
        state.consecutive_failures = state.consecutive_failures.max(threshold);
        if state.is_down() {
            return None;
        }
        state.status = HealthStatus::Down;
        Some(Transition::down(backend))
    }

    /// Record a heartbeat received at `now_ms`. A heartbeat is a clean signal.
    pub fn record_heartbeat(&mut self, backend: BackendId, now_ms: u64) -> Option<Transition> {
        self.state_mut(backend).last_heartbeat_at = Some(now_ms);
        self.observe(backend, Signal::Success)
    }

    /// Age out stale heartbeats. Backends that never sent one are left alone.
    pub fn evaluate_heartbeats(&mut self, now_ms: u64) -> Vec<Transition> {
        let timeout = self.heartbeat_timeout_ms;
        let mut transitions = Vec::new();
        for backend in BackendId::ALL {
            let state = self.state(backend);
            let stale = match state.last_heartbeat_at {
                Some(last) => now_ms.saturating_sub(last) > timeout,
                None => false,
            };
            if stale && !state.is_down() {
                let state = self.state_mut(backend);
                state.status = HealthStatus::Down;
                transitions.push(Transition::down(backend));
            }
        }
        transitions
    }

    /// Forget counters and statuses; heartbeat receipt times are kept.
    pub fn reset(&mut self) {
        for backend in BackendId::ALL {
            let state = self.state_mut(backend);
            state.consecutive_failures = 0;
            state.status = HealthStatus::Healthy;
        }
    }
}
