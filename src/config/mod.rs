//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FailoverConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::FailoverConfig;
pub use schema::ListenerConfig;
pub use schema::BackendsConfig;
pub use schema::DetectionConfig;
pub use schema::DetectionMode;
pub use schema::ForwardingConfig;
pub use schema::SwitchoverConfig;
pub use schema::ObservabilityConfig;

pub use loader::{load_config, parse_config, ConfigError};
pub use validation::{validate_config, ValidationError};
