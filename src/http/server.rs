//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with admin routes and the forwarding fallback
//! - Wire up middleware (tracing, body limit, request ID)
//! - Start the liveness monitor alongside the listener
//! - Stop both on the shutdown signal

use std::net::AddrParseError;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::backend::client::BackendClient;
use crate::backend::Backends;
use crate::config::FailoverConfig;
use crate::failover::FailoverController;
use crate::health;
use crate::http::request::X_REQUEST_ID;
use crate::routing::{ForwardRequest, Forwarder};

const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid backend address: {0}")]
    BackendAddress(#[from] AddrParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<FailoverController>,
    pub forwarder: Arc<Forwarder>,
    pub backends: Backends,
    pub client: BackendClient,
    pub config: Arc<FailoverConfig>,
}

/// HTTP server for the failover controller.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: FailoverConfig) -> Result<Self, ServerError> {
        let backends = Backends::from_config(&config.backends)?;
        let client = BackendClient::new().with_response_limit(config.forwarding.max_response_bytes);
        let controller = Arc::new(FailoverController::from_config(&config));
        let forwarder = Arc::new(Forwarder::new(
            backends.clone(),
            client.clone(),
            controller.clone(),
            &config.forwarding,
        ));

        let state = AppState {
            controller,
            forwarder,
            backends,
            client,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        let body_limit = state.config.forwarding.max_body_bytes;

        Router::new()
            .merge(admin::routes())
            .fallback(proxy_handler)
            .with_state(state)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id)),
            )
    }

    pub fn controller(&self) -> Arc<FailoverController> {
        self.state.controller.clone()
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let config = &self.state.config;
        tracing::info!(
            address = %addr,
            primary = %self.state.backends.primary.addr,
            spare = %self.state.backends.spare.addr,
            mode = ?config.detection.mode,
            "HTTP server starting"
        );

        let monitor = health::spawn_monitor(
            &config.detection,
            self.state.controller.clone(),
            self.state.backends.clone(),
            self.state.client.clone(),
            shutdown.resubscribe(),
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(handle) = monitor {
            if tokio::time::timeout(MONITOR_STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Health monitor did not stop in time");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Everything that is not an admin route goes to the active backend.
async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match ForwardRequest::from_parts(method, &uri, &headers, body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };

    match state.forwarder.forward(request).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}
