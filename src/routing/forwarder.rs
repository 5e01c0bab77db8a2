//! Forwarding router with one-shot fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::backend::client::{BackendClient, UpstreamError, UpstreamResponse};
use crate::backend::{BackendId, Backends};
use crate::clock;
use crate::config::ForwardingConfig;
use crate::failover::{FailoverController, SignalSource};
use crate::health::state::Signal;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::switchover::{AttemptStatus, RequestLogEntry};

/// A request ready to be sent to either backend.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path_and_query: String,
    /// JSON-encoded body, present for body-carrying methods.
    pub body: Option<Bytes>,
    pub request_id: Option<HeaderValue>,
}

impl ForwardRequest {
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.into(),
            body: None,
            request_id: None,
        }
    }

    fn request_id(&self) -> &str {
        self.request_id
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// No backend produced a response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("both primary and spare are unavailable (primary: {primary}; spare: {spare})")]
    BothUnavailable {
        primary: UpstreamError,
        spare: UpstreamError,
    },

    #[error("upstream request failed: {0}")]
    Upstream(UpstreamError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            ProxyError::BothUnavailable { primary, spare } => json!({
                "error": "Both primary and spare are unavailable",
                "primary": primary.to_string(),
                "spare": spare.to_string(),
            }),
            ProxyError::Upstream(e) => json!({
                "error": "Upstream request failed",
                "backend": e.backend(),
                "details": e.to_string(),
            }),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// Sends requests to the active target and falls back to the spare once.
pub struct Forwarder {
    backends: Backends,
    client: BackendClient,
    controller: Arc<FailoverController>,
    timeout: Duration,
    failover_on_transport_error: bool,
}

impl Forwarder {
    pub fn new(
        backends: Backends,
        client: BackendClient,
        controller: Arc<FailoverController>,
        config: &ForwardingConfig,
    ) -> Self {
        Self {
            backends,
            client,
            controller,
            timeout: config.timeout(),
            failover_on_transport_error: config.failover_on_transport_error,
        }
    }

    pub async fn forward(&self, request: ForwardRequest) -> Result<UpstreamResponse, ProxyError> {
        let (target, generation) = self.controller.route_snapshot();

        tracing::debug!(
            request_id = %request.request_id(),
            method = %request.method,
            path = %request.path_and_query,
            backend = %target,
            "Forwarding request"
        );

        let primary_error = match self.attempt(target, &request, generation).await {
            Ok(response) => return Ok(response),
            Err(e) if e.answered_with().is_some() => {
                tracing::warn!(request_id = %request.request_id(), error = %e, "Response too large to pass through");
                return Err(ProxyError::Upstream(e));
            }
            Err(e) if target == BackendId::Primary => e,
            Err(e) => {
                tracing::error!(request_id = %request.request_id(), error = %e, "Spare failed, no further fallback");
                return Err(ProxyError::Upstream(e));
            }
        };

        if self.failover_on_transport_error {
            let reason = format!("request forwarding failed to primary: {}", primary_error);
            self.controller.confirm_down(BackendId::Primary, &reason, generation);
        }
        tracing::warn!(
            request_id = %request.request_id(),
            error = %primary_error,
            "Primary attempt failed, falling back to spare"
        );

        match self.attempt(target.alternate(), &request, generation).await {
            Ok(response) => Ok(response),
            Err(spare) if spare.answered_with().is_some() => Err(ProxyError::Upstream(spare)),
            Err(spare) => {
                tracing::error!(request_id = %request.request_id(), error = %spare, "Fallback to spare failed");
                Err(ProxyError::BothUnavailable {
                    primary: primary_error,
                    spare,
                })
            }
        }
    }

    /// One physical attempt: send, log, signal.
    async fn attempt(
        &self,
        backend: BackendId,
        request: &ForwardRequest,
        generation: u64,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let started_at = clock::now_ms();
        let start = Instant::now();
        let result = match self.build(backend, request) {
            Ok(upstream) => self.client.send(backend, upstream, self.timeout).await,
            Err(e) => Err(e),
        };
        let latency = start.elapsed();

        let status = match &result {
            Ok(response) => AttemptStatus::Http(response.status.as_u16()),
            Err(e) if e.is_timeout() => AttemptStatus::Timeout,
            Err(e) => match e.answered_with() {
                Some(code) => AttemptStatus::Http(code.as_u16()),
                None => AttemptStatus::Error,
            },
        };
        self.controller.record_attempt(RequestLogEntry {
            timestamp: started_at,
            backend,
            status,
            latency_ms: latency.as_millis() as u64,
        });
        metrics::record_forward(backend, status, latency);

        let signal = if status.is_failure() { Signal::Failure } else { Signal::Success };
        self.controller.observe(backend, signal, SignalSource::Forward, generation);

        result
    }

    fn build(&self, backend: BackendId, request: &ForwardRequest) -> Result<Request<Body>, UpstreamError> {
        let build = |source| UpstreamError::Build { backend, source };
        let uri = self.backends.get(backend).uri(&request.path_and_query).map_err(build)?;

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        if let Some(id) = &request.request_id {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let body = match &request.body {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(bytes.clone())
            }
            None => Body::empty(),
        };
        builder.body(body).map_err(build)
    }
}
