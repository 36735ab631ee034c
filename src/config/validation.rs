//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays > 0, buffers non-empty)
//! - Check that configured origins are in the exact form browsers send
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    for origin in &config.origins.allowed {
        if let Err(message) = check_origin(origin) {
            errors.push(ValidationError::new("origins.allowed", message));
        }
    }

    match Url::parse(&config.broker.url) {
        Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "unix") => {}
        Ok(url) => errors.push(ValidationError::new(
            "broker.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("broker.url", e.to_string())),
    }
    if config.broker.patterns.is_empty() {
        errors.push(ValidationError::new("broker.patterns", "at least one pattern is required"));
    }
    if config.broker.patterns.iter().any(|p| p.trim().is_empty()) {
        errors.push(ValidationError::new("broker.patterns", "patterns must not be empty"));
    }
    if config.broker.base_delay_ms == 0 {
        errors.push(ValidationError::new("broker.base_delay_ms", "must be greater than 0"));
    }
    if config.broker.max_delay_ms < config.broker.base_delay_ms {
        errors.push(ValidationError::new(
            "broker.max_delay_ms",
            "must be greater than or equal to base_delay_ms",
        ));
    }
    if config.broker.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("broker.connect_timeout_ms", "must be greater than 0"));
    }

    if config.connection.send_buffer == 0 {
        errors.push(ValidationError::new("connection.send_buffer", "must be greater than 0"));
    }
    if config.connection.write_timeout_ms == 0 {
        errors.push(ValidationError::new("connection.write_timeout_ms", "must be greater than 0"));
    }
    if config.connection.ping_interval_ms == 0 {
        errors.push(ValidationError::new("connection.ping_interval_ms", "must be greater than 0"));
    }
    if config.connection.pong_timeout_ms == 0 {
        errors.push(ValidationError::new("connection.pong_timeout_ms", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An allowed origin must equal its own serialized form, otherwise it can
/// never match an `Origin` header.
fn check_origin(origin: &str) -> Result<(), String> {
    let url = Url::parse(origin).map_err(|e| format!("'{origin}' is not a valid origin: {e}"))?;
    let serialized = url.origin().ascii_serialization();
    if serialized == origin {
        Ok(())
    } else {
        Err(format!("'{origin}' is not in canonical form (expected '{serialized}')"))
    }
}
