//! Failover controller library.
//!
//! Routes traffic to a primary backend, detects its failure by polling or
//! heartbeat, switches to a spare, and measures how long the switchover took
//! and how many requests failed around it.

pub mod admin;
pub mod backend;
pub mod clock;
pub mod config;
pub mod failover;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod switchover;

pub use config::schema::FailoverConfig;
pub use failover::FailoverController;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
