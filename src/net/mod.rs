//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind; failure is fatal)
//!     → axum serve loop
//!     → connection.rs (identity, Connecting → Open → Closed)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{AtomicConnectionState, ConnectionId, ConnectionState};
pub use listener::{bind, ListenerError};
