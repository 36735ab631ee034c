//! HTTP and WebSocket front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, tracing layer)
//!     → GET /health: static liveness text
//!     → GET / or /ws: websocket.rs
//!         → origin check (4003) → connection cap (1013)
//!         → ConnectionLifecycle::open
//!         → reader loop: control frames → registry
//!         → writer task: outbound queue → socket
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer, HEALTH_BODY};
