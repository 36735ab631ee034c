//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Origins admitted to the WebSocket endpoint.
    pub origins: OriginConfig,

    /// Backend broker connection and pattern subscriptions.
    pub broker: BrokerConfig,

    /// Per-connection outbound queue and write settings.
    pub connection: ConnectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Origin allow-list.
///
/// Matching is exact; an empty list rejects every handshake.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OriginConfig {
    pub allowed: Vec<String>,
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker connection URL.
    pub url: String,

    /// Pattern subscriptions issued on every (re)connect.
    pub patterns: Vec<String>,

    /// Base delay for reconnect backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for reconnect backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Deadline for connecting and subscribing every pattern, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            patterns: vec![
                "scraper_*".to_string(),
                "dashboard_*".to_string(),
                "enrichment_*".to_string(),
            ],
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// What dispatch does when a connection's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Drop the message for the slow connection only.
    #[default]
    DropMessage,
    /// Drop the message and close the slow connection.
    CloseConnection,
}

impl std::str::FromStr for BackpressurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "drop_message" => Ok(Self::DropMessage),
            "close_connection" => Ok(Self::CloseConnection),
            other => Err(format!(
                "unknown backpressure policy '{other}' (expected drop_message or close_connection)"
            )),
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of each connection's outbound queue, in frames.
    pub send_buffer: usize,

    /// Deadline for a single socket write in milliseconds.
    pub write_timeout_ms: u64,

    /// Policy applied when the outbound queue is full.
    pub backpressure: BackpressurePolicy,

    /// Interval between server pings in milliseconds.
    pub ping_interval_ms: u64,

    /// Grace period after a missed ping before the peer is dropped, in milliseconds.
    pub pong_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            write_timeout_ms: 5_000,
            backpressure: BackpressurePolicy::DropMessage,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
