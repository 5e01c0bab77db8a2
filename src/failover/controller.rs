//! The failover controller.
//!
//! # Responsibilities
//! - Own the active target, per-backend health and the request log
//! - Apply detector transitions to the state machine
//! - Record forwarding attempts and switchover timestamps
//! - Serve status, metrics and reset operations
//!
//! # Design Decisions
//! - One mutex around all mutable state; target and counters change together
//! - The lock is never held across an await
//! - A reset bumps the generation; signals gathered under an older generation
//!   are dropped, so a reset always wins over an in-flight probe

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;

use crate::backend::BackendId;
use crate::clock;
use crate::config::FailoverConfig;
use crate::health::state::{FailureDetector, HealthState, HealthStatus, Signal, Transition};
use crate::failover::machine::{FailoverMachine, SwitchRecord};
use crate::observability::metrics;
use crate::switchover::{RequestLog, RequestLogEntry, SwitchoverEvent, SwitchoverReport, SwitchoverWindow};

/// Where a liveness signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Probe,
    Forward,
}

impl SignalSource {
    fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Probe => "probe",
            SignalSource::Forward => "forward",
        }
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverState {
    pub active_target: BackendId,
    /// Consecutive failures of the active target.
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub switchovers: u64,
    pub last_switch: Option<SwitchRecord>,
    pub generation: u64,
    pub primary: HealthState,
    pub spare: HealthState,
}

#[derive(Debug)]
struct Inner {
    machine: FailoverMachine,
    detector: FailureDetector,
    log: RequestLog,
    event: Option<SwitchoverEvent>,
    generation: u64,
}

/// Single owner of all failover state.
#[derive(Debug)]
pub struct FailoverController {
    inner: Mutex<Inner>,
    window: SwitchoverWindow,
}

impl FailoverController {
    pub fn new(threshold: u32, heartbeat_timeout: Duration, window: SwitchoverWindow) -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: FailoverMachine::new(),
                detector: FailureDetector::new(threshold, heartbeat_timeout),
                log: RequestLog::new(),
                event: None,
                generation: 0,
            }),
            window,
        }
    }

    pub fn from_config(config: &FailoverConfig) -> Self {
        Self::new(
            config.detection.failure_threshold,
            config.detection.heartbeat_timeout(),
            SwitchoverWindow::from(&config.switchover),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the state half-written:
        // every mutation is a plain field store.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_target(&self) -> BackendId {
        self.lock().machine.active()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Active target and generation, read together.
    pub fn route_snapshot(&self) -> (BackendId, u64) {
        let inner = self.lock();
        (inner.machine.active(), inner.generation)
    }

    pub fn health(&self, backend: BackendId) -> HealthState {
        self.lock().detector.state(backend).clone()
    }

    /// Apply a success/failure signal gathered under `generation`.
    pub fn observe(
        &self,
        backend: BackendId,
        signal: Signal,
        source: SignalSource,
        generation: u64,
    ) -> Option<Transition> {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(backend = %backend, source = source.as_str(), "Dropping signal from before reset");
            return None;
        }
        if signal == Signal::Failure {
            let failures = inner.detector.state(backend).consecutive_failures + 1;
            tracing::debug!(
                backend = %backend,
                source = source.as_str(),
                failures,
                threshold = inner.detector.threshold(),
                "Failure signal"
            );
        }
        let transition = inner.detector.observe(backend, signal)?;
        let reason = format!(
            "{} consecutive {} failures on {}",
            inner.detector.state(backend).consecutive_failures,
            source.as_str(),
            backend
        );
        apply_transition(&mut inner, transition, &reason);
        Some(transition)
    }

    /// Declare `backend` down without waiting for the threshold.
    pub fn confirm_down(&self, backend: BackendId, reason: &str, generation: u64) -> Option<Transition> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        let transition = inner.detector.confirm_down(backend)?;
        apply_transition(&mut inner, transition, reason);
        Some(transition)
    }

    pub fn record_heartbeat(&self, backend: BackendId) -> u64 {
        let now = clock::now_ms();
        self.record_heartbeat_at(backend, now);
        now
    }

    pub fn record_heartbeat_at(&self, backend: BackendId, now_ms: u64) -> Option<Transition> {
        let mut inner = self.lock();
        let transition = inner.detector.record_heartbeat(backend, now_ms)?;
        apply_transition(&mut inner, transition, "heartbeat received");
        Some(transition)
    }

    pub fn evaluate_heartbeats(&self) -> Vec<Transition> {
        self.evaluate_heartbeats_at(clock::now_ms())
    }

    pub fn evaluate_heartbeats_at(&self, now_ms: u64) -> Vec<Transition> {
        let mut inner = self.lock();
        let transitions = inner.detector.evaluate_heartbeats(now_ms);
        for transition in &transitions {
            let last = inner.detector.state(transition.backend).last_heartbeat_at.unwrap_or_default();
            let reason = format!(
                "no heartbeat from {} for {}ms",
                transition.backend,
                now_ms.saturating_sub(last)
            );
            apply_transition(&mut inner, *transition, &reason);
        }
        transitions
    }

    /// Append a forwarding attempt to the log.
    pub fn record_attempt(&self, entry: RequestLogEntry) {
        let mut inner = self.lock();
        if let Some(event) = inner.event.as_mut() {
            if let Some(elapsed) = event.observe(&entry) {
                tracing::info!(time_to_recover_ms = elapsed, "First successful spare response after failure");
            }
        }
        inner.log.push(entry);
    }

    /// Mark a failure injection now. Returns the injection timestamp.
    pub fn inject_failure(&self) -> u64 {
        let now = clock::now_ms();
        self.inject_failure_at(now);
        now
    }

    pub fn inject_failure_at(&self, now_ms: u64) {
        self.lock().event = Some(SwitchoverEvent::new(now_ms));
    }

    /// Operator reset: primary becomes active again and all counters are cleared.
    pub fn reset(&self) -> FailoverState {
        let mut inner = self.lock();
        let previous = inner.machine.reset();
        inner.detector.reset();
        inner.generation += 1;
        tracing::info!(previous = %previous, generation = inner.generation, "Failover state reset, traffic back on primary");
        for backend in BackendId::ALL {
            metrics::record_backend_health(backend, true);
        }
        metrics::record_active_target(BackendId::Primary);
        snapshot(&inner)
    }

    /// Drop the request log and the current switchover measurement.
    /// Returns the number of entries removed.
    pub fn clear_history(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.log.len();
        inner.log.clear();
        inner.event = None;
        removed
    }

    pub fn state(&self) -> FailoverState {
        snapshot(&self.lock())
    }

    pub fn report(&self) -> SwitchoverReport {
        let inner = self.lock();
        SwitchoverReport::compute(inner.event.as_ref(), &inner.log, self.window)
    }

    pub fn window(&self) -> SwitchoverWindow {
        self.window
    }

    /// Total number of logged attempts and the most recent `limit` of them.
    pub fn recent_attempts(&self, limit: usize) -> (usize, Vec<RequestLogEntry>) {
        let inner = self.lock();
        (inner.log.len(), inner.log.recent(limit).to_vec())
    }
}

fn snapshot(inner: &Inner) -> FailoverState {
    let active = inner.machine.active();
    FailoverState {
        active_target: active,
        consecutive_failures: inner.detector.state(active).consecutive_failures,
        failure_threshold: inner.detector.threshold(),
        switchovers: inner.machine.switchovers(),
        last_switch: inner.machine.last_switch().cloned(),
        generation: inner.generation,
        primary: inner.detector.state(BackendId::Primary).clone(),
        spare: inner.detector.state(BackendId::Spare).clone(),
    }
}

fn apply_transition(inner: &mut Inner, transition: Transition, reason: &str) {
    let backend = transition.backend;
    match transition.status {
        HealthStatus::Down => {
            tracing::warn!(backend = %backend, reason, "Backend is DOWN");
            metrics::record_backend_health(backend, false);
            match backend {
                BackendId::Primary => {
                    if inner.machine.promote_spare(reason, clock::now_ms()) {
                        tracing::warn!(reason, "Switching traffic to spare");
                        metrics::record_switchover();
                        metrics::record_active_target(BackendId::Spare);
                    }
                }
                BackendId::Spare => {
                    if inner.machine.active() == BackendId::Spare {
                        tracing::error!(reason, "Spare is unhealthy and no further fallback exists");
                    }
                }
            }
        }
        HealthStatus::Healthy => {
            tracing::info!(backend = %backend, "Backend is UP again");
            metrics::record_backend_health(backend, true);
            if backend == BackendId::Primary && inner.machine.active() == BackendId::Spare {
                tracing::info!("Primary recovered; traffic stays on spare until reset");
            }
        }
    }
}
