//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming WebSocket handshake:
//!     → origin.rs (exact-match Origin allow-list)
//!     → limits.rs (concurrent connection cap)
//!     → admitted: handed to the connection lifecycle
//!     → rejected: closed with 4003 or 1013, never registered
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing Origin header is a rejection
//! - No wildcarding; the allow-list is compared verbatim

pub mod limits;
pub mod origin;

pub use limits::{ConnectionLimiter, CONNECTION_LIMIT_CLOSE_CODE};
pub use origin::{OriginGuard, FORBIDDEN_ORIGIN_CLOSE_CODE};
