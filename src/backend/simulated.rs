//! Simulated backend used for demos and tests.
//!
//! # Responsibilities
//! - Serve `/api`, `/api/data` and `/health` in a fixed pattern
//! - Switch failure mode on `POST /fail` and back on `POST /recover`
//! - Optionally push heartbeats to a controller while healthy
//!
//! # Failure Modes
//! ```text
//! Healthy       → 200 with a JSON body naming the node
//! ForcedError   → 500 on every endpoint
//! ForcedTimeout → requests are accepted but never answered
//! ForcedCrash   → the listener stops; open requests never complete
//! ```

use std::fmt;
use std::future::IntoFuture;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio::time;
use url::Url;

use crate::backend::BackendId;
use crate::clock;

/// Failure mode of a simulated backend.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureMode {
    #[serde(rename = "none")]
    Healthy = 0,
    #[serde(rename = "error")]
    ForcedError = 1,
    #[serde(rename = "timeout")]
    ForcedTimeout = 2,
    #[serde(rename = "crash")]
    ForcedCrash = 3,
}

impl From<u8> for FailureMode {
    fn from(val: u8) -> Self {
        match val {
            1 => FailureMode::ForcedError,
            2 => FailureMode::ForcedTimeout,
            3 => FailureMode::ForcedCrash,
            _ => FailureMode::Healthy,
        }
    }
}

impl FailureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::Healthy => "none",
            FailureMode::ForcedError => "error",
            FailureMode::ForcedTimeout => "timeout",
            FailureMode::ForcedCrash => "crash",
        }
    }

    /// Parse a mode that may be injected; `none` is not an injectable failure.
    pub fn parse_injectable(s: &str) -> Result<Self, InvalidFailureMode> {
        match s.parse()? {
            FailureMode::Healthy => Err(InvalidFailureMode(s.to_string())),
            mode => Ok(mode),
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid mode {0:?}. Must be 'error', 'timeout', or 'crash'")]
pub struct InvalidFailureMode(pub String);

impl FromStr for FailureMode {
    type Err = InvalidFailureMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FailureMode::Healthy),
            "error" => Ok(FailureMode::ForcedError),
            "timeout" => Ok(FailureMode::ForcedTimeout),
            "crash" => Ok(FailureMode::ForcedCrash),
            other => Err(InvalidFailureMode(other.to_string())),
        }
    }
}

/// How a simulated backend's serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    Stopped,
    Crashed,
}

/// A backend that answers in a fixed pattern and can be told to fail.
#[derive(Debug)]
pub struct SimulatedBackend {
    name: String,
    mode: AtomicU8,
    request_count: AtomicU64,
    started: Instant,
    crashed: Notify,
}

impl SimulatedBackend {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mode: AtomicU8::new(FailureMode::Healthy as u8),
            request_count: AtomicU64::new(0),
            started: Instant::now(),
            crashed: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> FailureMode {
        FailureMode::from(self.mode.load(Ordering::SeqCst))
    }

    /// Set the failure mode, returning the previous one.
    pub fn set_mode(&self, mode: FailureMode) -> FailureMode {
        let previous = FailureMode::from(self.mode.swap(mode as u8, Ordering::SeqCst));
        tracing::info!(node = %self.name, from = %previous, to = %mode, "Failure mode changed");
        if mode == FailureMode::ForcedCrash {
            self.crashed.notify_one();
        }
        previous
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/api", get(data))
            .route("/api/data", get(data))
            .route("/health", get(health))
            .route("/fail", post(fail))
            .route("/recover", post(recover))
            .route("/status", get(status))
            .with_state(self.clone())
    }

    /// Serve until shutdown or until the backend is crashed.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ServeOutcome, std::io::Error> {
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        });

        // A crash drops the server future without draining open requests.
        tokio::select! {
            result = server.into_future() => {
                result?;
                Ok(ServeOutcome::Stopped)
            }
            _ = self.crashed.notified() => {
                tracing::warn!(node = %self.name, "Simulated crash, listener closed");
                Ok(ServeOutcome::Crashed)
            }
        }
    }

    /// Push `POST <controller>/heartbeat?from=<id>` every `interval` while healthy.
    pub async fn run_heartbeats(
        self: Arc<Self>,
        controller: Url,
        from: BackendId,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut target = controller;
        target.set_path("/heartbeat");
        target.set_query(Some(&format!("from={}", from)));

        let client = reqwest::Client::new();
        let mut ticker = time::interval(interval);

        tracing::info!(node = %self.name, target = %target, "Heartbeat emitter starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.mode() != FailureMode::Healthy {
                        continue;
                    }
                    let sent = client.post(target.clone()).timeout(interval).send().await;
                    if let Err(e) = sent {
                        tracing::debug!(node = %self.name, error = %e, "Heartbeat not delivered");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(node = %self.name, "Heartbeat emitter stopping");
                    break;
                }
            }
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Never completes; used by the timeout and crash modes.
    async fn hang(&self) -> Response {
        std::future::pending().await
    }
}

async fn data(State(backend): State<Arc<SimulatedBackend>>) -> Response {
    match backend.mode() {
        FailureMode::Healthy => {
            let count = backend.request_count.fetch_add(1, Ordering::Relaxed) + 1;
            Json(json!({
                "node": backend.name,
                "ok": true,
                "ts": clock::now_ms(),
                "requestCount": count,
                "message": format!("Response from {}", backend.name),
            }))
            .into_response()
        }
        FailureMode::ForcedError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "node": backend.name,
                "ok": false,
                "error": "simulated",
                "ts": clock::now_ms(),
            })),
        )
            .into_response(),
        FailureMode::ForcedTimeout | FailureMode::ForcedCrash => backend.hang().await,
    }
}

async fn health(State(backend): State<Arc<SimulatedBackend>>) -> Response {
    match backend.mode() {
        FailureMode::Healthy => Json(json!({
            "status": "healthy",
            "node": backend.name,
            "ts": clock::now_ms(),
        }))
        .into_response(),
        FailureMode::ForcedError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "node": backend.name,
                "error": "simulated",
                "ts": clock::now_ms(),
            })),
        )
            .into_response(),
        FailureMode::ForcedTimeout | FailureMode::ForcedCrash => backend.hang().await,
    }
}

#[derive(Debug, Default, Deserialize)]
struct FailBody {
    mode: Option<String>,
}

async fn fail(State(backend): State<Arc<SimulatedBackend>>, body: Bytes) -> Response {
    let requested = serde_json::from_slice::<FailBody>(&body)
        .unwrap_or_default()
        .mode
        .unwrap_or_default();

    let mode = match FailureMode::parse_injectable(&requested) {
        Ok(mode) => mode,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if mode == FailureMode::ForcedCrash {
        // Answer first, then crash once the response has had time to flush.
        let crashing = backend.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            crashing.set_mode(FailureMode::ForcedCrash);
        });
        return Json(json!({
            "ok": true,
            "mode": mode,
            "message": format!("{} will crash shortly", backend.name),
            "ts": clock::now_ms(),
        }))
        .into_response();
    }

    backend.set_mode(mode);
    Json(json!({
        "ok": true,
        "mode": mode,
        "message": format!("{} failure mode activated", backend.name),
        "ts": clock::now_ms(),
    }))
    .into_response()
}

async fn recover(State(backend): State<Arc<SimulatedBackend>>) -> Json<serde_json::Value> {
    let previous = backend.set_mode(FailureMode::Healthy);
    Json(json!({
        "ok": true,
        "previousMode": previous,
        "currentMode": FailureMode::Healthy,
        "message": format!("{} recovered", backend.name),
        "ts": clock::now_ms(),
    }))
}

async fn status(State(backend): State<Arc<SimulatedBackend>>) -> Json<serde_json::Value> {
    Json(json!({
        "node": backend.name,
        "failureMode": backend.mode(),
        "requestCount": backend.request_count(),
        "uptimeSecs": backend.uptime_secs(),
        "ts": clock::now_ms(),
    }))
}
