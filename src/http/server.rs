//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router (`/`, `/ws`, `/health`)
//! - Wire up tracing middleware
//! - Serve on a bound listener until shutdown

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::http::websocket::ws_handler;
use crate::lifecycle::ShutdownSignal;

/// Static body returned by the health endpoint.
pub const HEALTH_BODY: &str = "Gateway service is running";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub shutdown: ShutdownSignal,
}

/// HTTP front of the gateway.
pub struct HttpServer {
    router: Router,
    shutdown: ShutdownSignal,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>, shutdown: ShutdownSignal) -> Self {
        let state = AppState {
            gateway,
            shutdown: shutdown.clone(),
        };
        Self {
            router: Self::build_router(state),
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until shutdown is triggered and every connection has closed.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut shutdown = self.shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    HEALTH_BODY
}
