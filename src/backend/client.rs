//! HTTP client for talking to backends.
//!
//! # Responsibilities
//! - Send a request to a backend and buffer its response
//! - Enforce a deadline on every call (headers and body)
//! - Classify failures as timeout or transport error
//!
//! # Design Decisions
//! - Timeout errors are distinct from other errors
//! - Responses are buffered so they can be passed through verbatim
//! - An oversized response is not a liveness failure: the backend answered

use std::future::poll_fn;
use std::pin::pin;
use std::time::Duration;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::body::{Body as _, Incoming};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde_json::Value;
use thiserror::Error;
use tokio::time;

use crate::backend::{Backend, BackendId};

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Why a call to a backend produced no response.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {backend} timed out after {timeout_ms}ms")]
    Timeout { backend: BackendId, timeout_ms: u64 },

    #[error("request to {backend} failed: {message}")]
    Transport { backend: BackendId, message: String },

    #[error("response from {backend} (status {status}) exceeds {limit} bytes")]
    ResponseTooLarge {
        backend: BackendId,
        status: StatusCode,
        limit: usize,
    },

    #[error("could not build request for {backend}: {source}")]
    Build {
        backend: BackendId,
        #[source]
        source: axum::http::Error,
    },
}

impl UpstreamError {
    pub fn backend(&self) -> BackendId {
        match self {
            UpstreamError::Timeout { backend, .. }
            | UpstreamError::Transport { backend, .. }
            | UpstreamError::ResponseTooLarge { backend, .. }
            | UpstreamError::Build { backend, .. } => *backend,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. })
    }

    /// Status line sent by the backend, when it got that far.
    pub fn answered_with(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::ResponseTooLarge { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A fully buffered backend response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub backend: BackendId,
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Thin wrapper over the hyper client shared by probes, forwards and control calls.
#[derive(Clone)]
pub struct BackendClient {
    inner: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendClient {
    pub fn new() -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());
        Self {
            inner,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Cap on buffered response bodies.
    pub fn with_response_limit(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Send `request` to `backend`, waiting at most `timeout` for the full response.
    pub async fn send(
        &self,
        backend: BackendId,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let exchange = async {
            let response: hyper::Response<Incoming> =
                self.inner.request(request).await.map_err(|e| UpstreamError::Transport {
                    backend,
                    message: e.to_string(),
                })?;
            let (parts, body) = response.into_parts();
            let body = match read_body(body, self.max_response_bytes).await {
                Ok(body) => body,
                Err(ReadError::TooLarge) => {
                    return Err(UpstreamError::ResponseTooLarge {
                        backend,
                        status: parts.status,
                        limit: self.max_response_bytes,
                    })
                }
                Err(ReadError::Body(e)) => {
                    return Err(UpstreamError::Transport {
                        backend,
                        message: e.to_string(),
                    })
                }
            };
            Ok(UpstreamResponse {
                backend,
                status: parts.status,
                content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
                body,
            })
        };

        match time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                backend,
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// POST a JSON document to `path` on `backend`.
    pub async fn post_json(
        &self,
        backend: &Backend,
        path: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let build = |source| UpstreamError::Build { backend: backend.id, source };
        let uri = backend.uri(path).map_err(build)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .map_err(build)?;
        self.send(backend.id, request, timeout).await
    }
}

enum ReadError {
    TooLarge,
    Body(hyper::Error),
}

/// Buffer `body`, giving up as soon as it grows past `limit` bytes.
async fn read_body(body: Incoming, limit: usize) -> Result<Bytes, ReadError> {
    if body.size_hint().lower() > limit as u64 {
        return Err(ReadError::TooLarge);
    }
    let mut body = pin!(body);
    let mut buf = Vec::new();
    while let Some(frame) = poll_fn(|cx| body.as_mut().poll_frame(cx)).await {
        let frame = frame.map_err(ReadError::Body)?;
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > limit {
                return Err(ReadError::TooLarge);
            }
            buf.extend_from_slice(&data);
        }
    }
    Ok(Bytes::from(buf))
}
