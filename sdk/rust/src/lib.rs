//! Typed client for the failover controller's operator API.

pub mod client;

pub use client::*;
