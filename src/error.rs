//! Top-level error type.

use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::net::ListenerError;

/// Fatal gateway errors. Anything that reaches `main` ends the process.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bind(#[from] ListenerError),
    #[error("broker setup failed: {0}")]
    Broker(#[from] BrokerError),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
