//! Failover decision making.
//!
//! # Data Flow
//! ```text
//! Probe / heartbeat / forward outcome
//!     → controller.rs (single owner, one lock)
//!     → health::state::FailureDetector (Healthy ↔ Down)
//!     → machine.rs (Primary → Spare, reset → Primary)
//! ```

pub mod controller;
pub mod machine;

pub use controller::{FailoverController, FailoverState, SignalSource};
pub use machine::{FailoverMachine, SwitchRecord};
