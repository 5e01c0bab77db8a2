//! Operator API.
//!
//! Status and measurement queries, failure injection, reset, and the
//! heartbeat receiver. Mounted next to the forwarding fallback, so these
//! paths are never forwarded.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use crate::http::server::AppState;
use self::handlers::*;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/heartbeat", post(receive_heartbeat))
        .route("/inject-failure", post(inject_failure))
        .route("/recover-primary", post(recover_primary))
        .route("/reset", post(reset))
        .route("/failover/reset", post(reset))
        .route("/status", get(get_status))
        .route("/failover/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .route("/logs", get(get_logs).delete(clear_logs))
}
