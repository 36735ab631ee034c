//! The gateway aggregate: every long-lived component, built once.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::broker::{BrokerBridge, BrokerConnector};
use crate::config::GatewayConfig;
use crate::dispatch::DispatchEngine;
use crate::error::GatewayError;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{ConnectionLifecycle, ShutdownSignal};
use crate::registry::ConnectionRegistry;
use crate::resilience::ReconnectPolicy;
use crate::security::{ConnectionLimiter, OriginGuard};

const BRIDGE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the registry, dispatch engine, broker bridge and admission
/// policy, and hands them to the HTTP layer.
pub struct Gateway {
    config: GatewayConfig,
    origins: OriginGuard,
    limiter: ConnectionLimiter,
    registry: Arc<ConnectionRegistry>,
    dispatch: Arc<DispatchEngine>,
    lifecycle: ConnectionLifecycle,
    bridge: Arc<BrokerBridge>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, connector: Arc<dyn BrokerConnector>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatch = Arc::new(DispatchEngine::new(
            registry.clone(),
            config.connection.backpressure,
        ));
        let bridge = Arc::new(BrokerBridge::new(
            connector,
            config.broker.patterns.clone(),
            dispatch.clone(),
            ReconnectPolicy::from_config(&config.broker),
        ));

        Self {
            origins: OriginGuard::from_config(&config.origins),
            limiter: ConnectionLimiter::new(config.listener.max_connections),
            lifecycle: ConnectionLifecycle::new(registry.clone()),
            registry,
            dispatch,
            bridge,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn origins(&self) -> &OriginGuard {
        &self.origins
    }

    pub fn limiter(&self) -> &ConnectionLimiter {
        &self.limiter
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn dispatch(&self) -> &Arc<DispatchEngine> {
        &self.dispatch
    }

    pub fn lifecycle(&self) -> &ConnectionLifecycle {
        &self.lifecycle
    }

    pub fn bridge(&self) -> &Arc<BrokerBridge> {
        &self.bridge
    }

    /// Router serving the WebSocket and health endpoints.
    pub fn router(self: &Arc<Self>, shutdown: ShutdownSignal) -> Router {
        HttpServer::build_router(AppState {
            gateway: Arc::clone(self),
            shutdown,
        })
    }

    /// Start the broker bridge and serve on `listener` until `shutdown`.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), GatewayError> {
        info!(
            origins = ?self.origins.allowed(),
            patterns = ?self.config.broker.patterns,
            backpressure = ?self.config.connection.backpressure,
            "Gateway starting"
        );

        let bridge_task = self.bridge.clone().start(shutdown.clone());
        let served = HttpServer::new(self.clone(), shutdown.clone())
            .run(listener)
            .await;

        if shutdown.is_triggered() {
            if tokio::time::timeout(BRIDGE_STOP_TIMEOUT, bridge_task).await.is_err() {
                warn!("Broker bridge did not stop in time");
            }
        } else {
            bridge_task.abort();
        }

        served.map_err(GatewayError::Serve)?;
        info!(
            connections = self.registry.connection_count(),
            "Gateway stopped"
        );
        Ok(())
    }
}
