//! Broker subsystem.
//!
//! # Data Flow
//! ```text
//! Redis PSUBSCRIBE scraper_* / dashboard_* / enrichment_*
//!     → redis.rs (RedisConnector: connect + pattern-subscribe)
//!     → bridge.rs (BrokerBridge: consume, reconnect with backoff)
//!     → DispatchEngine::dispatch, in arrival order
//! ```
//!
//! # Design Decisions
//! - A few broker-level patterns cover every channel; exact topic matching
//!   happens locally in dispatch
//! - At-most-once: nothing is buffered while the link is down
//! - The connector is a trait so the bridge runs against any broker source

pub mod bridge;
pub mod redis;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::borrow::Cow;

pub use bridge::{BridgeState, BrokerBridge};
pub use self::redis::RedisConnector;

/// One event received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// The exact channel the message was published on.
    pub channel: String,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// The payload as text; invalid UTF-8 sequences are replaced.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Errors talking to the broker. Always recoverable by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("pattern subscribe '{pattern}' failed: {message}")]
    Subscribe { pattern: String, message: String },
    #[error("broker handshake timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Messages from one broker session. Ends when the session is lost.
pub type BrokerStream = BoxStream<'static, BrokerMessage>;

/// Opens a broker session subscribed to a set of patterns.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Connect and pattern-subscribe to every entry of `patterns` before
    /// returning the message stream.
    async fn connect(&self, patterns: &[String]) -> Result<BrokerStream, BrokerError>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}
