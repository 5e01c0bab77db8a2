use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::backend::client::UpstreamError;
use crate::backend::simulated::{FailureMode, InvalidFailureMode};
use crate::backend::BackendId;
use crate::clock;
use crate::config::FailoverConfig;
use crate::failover::FailoverState;
use crate::health::passive::{self, HeartbeatAck, HeartbeatRejected};
use crate::http::server::AppState;
use crate::switchover::{RequestLogEntry, SwitchoverReport};

const DEFAULT_LOG_LIMIT: usize = 50;
const DEFAULT_INJECTED_MODE: &str = "timeout";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    InvalidMode(#[from] InvalidFailureMode),

    #[error("request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error(transparent)]
    Heartbeat(#[from] HeartbeatRejected),

    #[error("Failed to contact primary: {0}")]
    PrimaryUnreachable(UpstreamError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::InvalidMode(_) | AdminError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AdminError::Heartbeat(HeartbeatRejected::PollingMode) => StatusCode::CONFLICT,
            AdminError::Heartbeat(_) => StatusCode::BAD_REQUEST,
            AdminError::PrimaryUnreachable(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddresses {
    pub primary: String,
    pub spare: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: &'static str,
    #[serde(flatten)]
    pub state: FailoverState,
    pub backends: BackendAddresses,
    pub total_requests: usize,
    pub timestamp: u64,
    pub config: FailoverConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub report: SwitchoverReport,
    pub active_target: BackendId,
    pub total_requests: usize,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub total: usize,
    pub showing: usize,
    pub logs: Vec<RequestLogEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub state: FailoverState,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatQuery {
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InjectBody {
    mode: Option<String>,
}

pub async fn receive_heartbeat(
    State(state): State<AppState>,
    Query(query): Query<HeartbeatQuery>,
) -> Result<Json<HeartbeatAck>, AdminError> {
    let ack = passive::accept(&state.controller, state.config.detection.mode, query.from.as_deref())?;
    Ok(Json(ack))
}

pub async fn inject_failure(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AdminError> {
    let body: InjectBody = if body.is_empty() {
        InjectBody::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let mode = injected_mode(body.mode.as_deref())?;

    let t_fail = state.controller.inject_failure();
    tracing::warn!(mode = %mode, t_fail, "Injecting failure on primary");

    let payload = json!({ "mode": mode });
    let timeout = state.config.forwarding.control_timeout();
    let reply = match state.client.post_json(&state.backends.primary, "/fail", &payload, timeout).await {
        Ok(response) => json!({
            "ok": true,
            "tFail": t_fail,
            "mode": mode,
            "primaryResponse": response.json(),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Primary did not acknowledge failure injection");
            json!({
                "ok": true,
                "tFail": t_fail,
                "mode": mode,
                "error": AdminError::PrimaryUnreachable(e).to_string(),
            })
        }
    };
    Ok(Json(reply))
}

pub async fn recover_primary(State(state): State<AppState>) -> Result<Json<Value>, AdminError> {
    tracing::info!("Recovering primary");
    let timeout = state.config.forwarding.control_timeout();
    let result = state
        .client
        .post_json(&state.backends.primary, "/recover", &json!({}), timeout)
        .await;

    // Traffic returns to primary even when it could not be reached.
    let snapshot = state.controller.reset();

    let response = result.map_err(AdminError::PrimaryUnreachable)?;
    Ok(Json(json!({
        "ok": true,
        "primaryResponse": response.json(),
        "state": snapshot,
    })))
}

pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    let snapshot = state.controller.reset();
    Json(ResetResponse {
        success: true,
        message: "Failover state reset",
        state: snapshot,
        timestamp: clock::now_ms(),
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (total_requests, _) = state.controller.recent_attempts(0);
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        state: state.controller.state(),
        backends: BackendAddresses {
            primary: state.backends.primary.addr.to_string(),
            spare: state.backends.spare.addr.to_string(),
        },
        total_requests,
        timestamp: clock::now_ms(),
        config: state.config.as_ref().clone(),
    })
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let (total_requests, _) = state.controller.recent_attempts(0);
    Json(MetricsResponse {
        report: state.controller.report(),
        active_target: state.controller.active_target(),
        total_requests,
    })
}

pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<LogsResponse> {
    let limit = parse_limit(query.limit.as_deref());
    let (total, logs) = state.controller.recent_attempts(limit);
    Json(LogsResponse {
        total,
        showing: logs.len(),
        logs,
    })
}

pub async fn clear_logs(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.controller.clear_history();
    tracing::info!(cleared, "Request log cleared");
    Json(json!({ "ok": true, "cleared": cleared }))
}

/// A missing or empty mode means the default.
fn injected_mode(raw: Option<&str>) -> Result<FailureMode, InvalidFailureMode> {
    let raw = raw.filter(|mode| !mode.is_empty()).unwrap_or(DEFAULT_INJECTED_MODE);
    FailureMode::parse_injectable(raw)
}

/// Missing, unparsable or zero limits fall back to the default.
fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_LOG_LIMIT)
}
