//! Switchover measurement.
//!
//! # Metrics
//! - Time-to-recover: first successful spare response minus failure injection
//! - Error rate: failed attempts / all attempts inside
//!   `[injected - before, injected + after]`
//!
//! # Design Decisions
//! - Computed on demand from the request log, never streamed
//! - Both values are `None` until they can be computed (no 0/0)
//! - Each injection starts a fresh measurement

pub mod log;

use serde::Serialize;

use crate::backend::BackendId;
use crate::config::SwitchoverConfig;

pub use log::{AttemptStatus, RequestLog, RequestLogEntry};

/// One injected failure and the first recovery observed after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchoverEvent {
    pub failure_injected_at: u64,
    pub first_spare_success_at: Option<u64>,
}

impl SwitchoverEvent {
    pub fn new(failure_injected_at: u64) -> Self {
        Self {
            failure_injected_at,
            first_spare_success_at: None,
        }
    }

    /// Account for a logged attempt. Returns the recovery time when this entry
    /// is the first 200 from the spare completed after the injection.
    pub fn observe(&mut self, entry: &RequestLogEntry) -> Option<u64> {
        if self.first_spare_success_at.is_some()
            || entry.backend != BackendId::Spare
            || entry.status != AttemptStatus::Http(200)
        {
            return None;
        }
        let completed_at = entry.completed_at();
        if completed_at < self.failure_injected_at {
            return None;
        }
        self.first_spare_success_at = Some(completed_at);
        self.time_to_recover_ms()
    }

    pub fn time_to_recover_ms(&self) -> Option<u64> {
        self.first_spare_success_at
            .map(|at| at.saturating_sub(self.failure_injected_at))
    }
}

/// Bounds of the error-rate window around the injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchoverWindow {
    pub before: u64,
    pub after: u64,
}

impl Default for SwitchoverWindow {
    fn default() -> Self {
        Self { before: 2000, after: 10_000 }
    }
}

impl From<&SwitchoverConfig> for SwitchoverWindow {
    fn from(config: &SwitchoverConfig) -> Self {
        Self {
            before: config.window_before_ms,
            after: config.window_after_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WindowCounts {
    pub total: usize,
    pub failed: usize,
}

/// Switchover metrics as computed at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchoverReport {
    pub t_fail: Option<u64>,
    pub t_first_spare_success: Option<u64>,
    pub time_to_recover_ms: Option<u64>,
    pub window: SwitchoverWindow,
    pub error_rate: Option<f64>,
    pub counts: WindowCounts,
}

impl SwitchoverReport {
    pub fn compute(
        event: Option<&SwitchoverEvent>,
        log: &RequestLog,
        window: SwitchoverWindow,
    ) -> Self {
        let Some(event) = event else {
            return Self {
                t_fail: None,
                t_first_spare_success: None,
                time_to_recover_ms: None,
                window,
                error_rate: None,
                counts: WindowCounts::default(),
            };
        };

        let start = event.failure_injected_at.saturating_sub(window.before);
        let end = event.failure_injected_at.saturating_add(window.after);
        let counts = log.within(start, end).fold(WindowCounts::default(), |mut counts, entry| {
            counts.total += 1;
            if entry.status.is_failure() {
                counts.failed += 1;
            }
            counts
        });
        let error_rate = (counts.total > 0).then(|| counts.failed as f64 / counts.total as f64);

        Self {
            t_fail: Some(event.failure_injected_at),
            t_first_spare_success: event.first_spare_success_at,
            time_to_recover_ms: event.time_to_recover_ms(),
            window,
            error_rate,
            counts,
        }
    }
}
