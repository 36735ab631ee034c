//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → optional TOML file (loader.rs)
//!     → environment / CLI overrides (loader.rs, ConfigOverrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to Gateway::new at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no persisted state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigOverrides};
pub use schema::{
    BackpressurePolicy, BrokerConfig, ConnectionConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, OriginConfig,
};
