//! Client-facing wire protocol.
//!
//! ```text
//! Client → Gateway: {"action":"subscribe","topic":"<string>"}
//!                   {"action":"unsubscribe","topic":"<string>"}
//! Gateway → Client: {"channel":"<string>","message":"<string>"}
//! ```

pub mod client;
pub mod envelope;

pub use client::{ControlMessage, ProtocolError};
pub use envelope::Envelope;
