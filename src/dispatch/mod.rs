//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! BrokerBridge ──BrokerMessage──▶ DispatchEngine
//!     → registry.subscribers_of(channel)   (exact match, snapshot)
//!     → Envelope encoded once
//!     → try_send on each connection's bounded queue
//!     → full queue: drop message, or drop message + close connection
//! ```
//!
//! # Design Decisions
//! - Backpressure policy is one process-wide setting
//! - Dispatch is synchronous; broker order is preserved per connection

pub mod engine;

pub use engine::{DispatchEngine, DispatchReport};
