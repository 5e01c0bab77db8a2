//! Inbound request preparation.
//!
//! # Responsibilities
//! - Name the request id header
//! - Turn an inbound request into a `ForwardRequest`
//!
//! # Design Decisions
//! - GET and HEAD never carry a body
//! - Other methods forward their body re-encoded as JSON; an empty body is `{}`
//! - Only bodies declared as JSON are parsed; anything else is forwarded as `{}`
//! - Body size is capped by `DefaultBodyLimit` before this code runs

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::routing::ForwardRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum RequestRejection {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl IntoResponse for RequestRejection {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl ForwardRequest {
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Self, RequestRejection> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else if body.is_empty() || !declares_json(headers) {
            Some(Bytes::from_static(b"{}"))
        } else {
            let value: Value = serde_json::from_slice(&body)?;
            Some(Bytes::from(value.to_string()))
        };

        Ok(Self {
            method,
            path_and_query,
            body,
            request_id: headers.get(X_REQUEST_ID).cloned(),
        })
    }
}

/// `application/json` or a `+json` suffix, parameters ignored.
fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|essence| {
            let essence = essence.trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}
