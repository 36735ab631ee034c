//! Frames sent to clients.

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;

/// `{"channel": ..., "message": ...}` as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<'a> {
    pub channel: &'a str,
    pub message: &'a str,
}

impl<'a> Envelope<'a> {
    pub fn new(channel: &'a str, message: &'a str) -> Self {
        Self { channel, message }
    }

    /// Serialize once for fan-out to many connections.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}
