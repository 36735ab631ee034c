//! Connection registry subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionLifecycle ──register / subscribe / unsubscribe / unregister──▶ ConnectionRegistry
//! DispatchEngine      ──subscribers_of(channel) (read-only snapshot)─────▶ ConnectionRegistry
//! ```
//!
//! # Design Decisions
//! - The registry is the only holder of subscription data
//! - Inverted topic index keeps dispatch O(subscribers)
//! - One lock over both indices; mutations touch them together
//! - Handles are `Arc`-shared so snapshots outlive registry changes

pub mod handle;
pub mod subscriptions;

pub use handle::{ConnectionHandle, OutboundFrame, SendOutcome};
pub use subscriptions::{ConnectionRegistry, RegistryError};
