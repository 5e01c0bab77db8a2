//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Bind listener → Server + health monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, monitor loop exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds before background tasks start

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
