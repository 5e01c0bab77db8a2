//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller, forwarder, health monitor produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer to backends
//! - Recording without an installed recorder is a no-op

pub mod logging;
pub mod metrics;
