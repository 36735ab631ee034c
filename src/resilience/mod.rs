//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Broker link lost:
//!     → backoff.rs (exponential delay with jitter, capped)
//!     → reconnect + re-subscribe
//! ```
//!
//! # Design Decisions
//! - Jittered backoff prevents thundering herd against the broker
//! - Retries never give up; only shutdown stops them

pub mod backoff;

pub use backoff::{calculate_backoff, ReconnectPolicy};
