//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request id assigned (x-request-id, UUID v4)
//!     → admin routes (status, metrics, logs, inject, reset, heartbeat)
//!     → everything else: request.rs (JSON body) → routing::Forwarder
//!     → buffered backend response or 502
//! ```

pub mod request;
pub mod server;

pub use request::{RequestRejection, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
