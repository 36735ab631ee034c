//! Realtime pub/sub WebSocket gateway.
//!
//! Bridges a Redis-style broker to browser clients: clients subscribe to
//! topics over a WebSocket, and every broker message on a matching channel
//! is fanned out to them as a JSON envelope.

pub mod broker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
