//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe both backends with a bounded timeout
//! - Turn each probe result into one success/failure signal
//!
//! # Design Decisions
//! - Non-2xx, timeouts and connection errors are failures
//! - A 2xx whose JSON `status` says unhealthy is a failure too
//! - Probes started before a reset are discarded (generation check)

use std::time::Duration;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use futures_util::future::join_all;
use serde_json::Value;

use crate::backend::client::BackendClient;
use crate::backend::{Backend, Backends};
use crate::failover::{FailoverController, SignalSource};
use crate::health::state::Signal;
use crate::health::LivenessSource;

const NEGATIVE_STATUSES: [&str; 3] = ["unhealthy", "down", "degraded"];

/// Polls `GET <path>` on every backend.
pub struct ActiveProbe {
    backends: Backends,
    client: BackendClient,
    path: String,
    timeout: Duration,
}

impl ActiveProbe {
    pub fn new(backends: Backends, client: BackendClient, path: String, timeout: Duration) -> Self {
        Self {
            backends,
            client,
            path,
            timeout,
        }
    }

    async fn probe(&self, backend: &Backend) -> Signal {
        let request = match backend.uri(&self.path).and_then(|uri| {
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .header(header::USER_AGENT, "failover-proxy-health-check")
                .body(Body::empty())
        }) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %backend.id, error = %e, "Failed to build health check request");
                return Signal::Failure;
            }
        };

        match self.client.send(backend.id, request, self.timeout).await {
            Ok(response) => {
                let signal = interpret(response.status, &response.body);
                if signal == Signal::Failure {
                    tracing::debug!(backend = %backend.id, status = %response.status, "Health check failed");
                }
                signal
            }
            Err(e) => match e.answered_with() {
                // Oversized but answered: judge the status line alone.
                Some(status) => interpret(status, &[]),
                None => {
                    tracing::debug!(backend = %backend.id, error = %e, "Health check failed");
                    Signal::Failure
                }
            },
        }
    }
}

impl LivenessSource for ActiveProbe {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn check(&self, controller: &FailoverController) {
        let generation = controller.generation();
        let probes = self.backends.iter().map(|backend| async move {
            (backend.id, self.probe(backend).await)
        });

        for (backend, signal) in join_all(probes).await {
            controller.observe(backend, signal, SignalSource::Probe, generation);
        }
    }
}

/// Classify a health response.
pub fn interpret(status: StatusCode, body: &[u8]) -> Signal {
    if !status.is_success() {
        return Signal::Failure;
    }
    let reported = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| json.get("status").and_then(Value::as_str).map(str::to_ascii_lowercase));
    match reported {
        Some(s) if NEGATIVE_STATUSES.contains(&s.as_str()) => Signal::Failure,
        _ => Signal::Success,
    }
}
