//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (method, path + query, JSON body)
//!     → forwarder.rs: read active target from the controller
//!     → attempt on active target (bounded timeout)
//!     → transport failure on primary: one sequential attempt on spare
//!     → every attempt: request log entry + detector signal
//!     → buffered response passed through, or 502
//! ```
//!
//! # Design Decisions
//! - Fallback never races the primary attempt
//! - No retries beyond the single fallback
//! - Logging granularity is one entry per physical attempt

pub mod forwarder;

pub use forwarder::{ForwardRequest, Forwarder, ProxyError};
