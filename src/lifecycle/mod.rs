//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Connections (connection.rs):
//!     Origin admitted → open → control frames → Closed → unregister
//!
//! Shutdown (shutdown.rs):
//!     Trigger → server stops accepting, bridge stops, sockets close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Teardown is unconditional and idempotent
//! - Registry mutations only happen while a connection is `Open`
//! - One shutdown signal shared by every long-lived task

pub mod connection;
pub mod shutdown;
pub mod signals;

pub use connection::{ConnectionLifecycle, ConnectionSession};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
