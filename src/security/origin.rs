//! Origin allow-listing for WebSocket handshakes.

use crate::config::OriginConfig;

/// Close code sent when a handshake's origin is not allowed.
pub const FORBIDDEN_ORIGIN_CLOSE_CODE: u16 = 4003;

/// Admission check against a fixed, ordered allow-list.
///
/// Matching is exact string equality. A missing `Origin` header is always
/// rejected, as is everything when the list is empty.
#[derive(Debug, Clone, Default)]
pub struct OriginGuard {
    allowed: Vec<String>,
}

impl OriginGuard {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn from_config(config: &OriginConfig) -> Self {
        Self::new(config.allowed.clone())
    }

    /// Whether a handshake carrying `origin` may be admitted.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) => self.allowed.iter().any(|allowed| allowed == origin),
            None => false,
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}
