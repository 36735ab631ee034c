//! Realtime Gateway
//!
//! A pub/sub WebSocket gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                       GATEWAY                        │
//!                      │                                                      │
//!   Browser clients    │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐   │
//!   ◀═══ WebSocket ════┼═▶│  http   │──▶│lifecycle │──▶│    registry      │   │
//!                      │  │ origin  │   │ sessions │   │ conn ⇄ topics    │   │
//!                      │  └────▲────┘   └──────────┘   └────────▲─────────┘   │
//!                      │       │ per-connection queues          │ snapshot    │
//!                      │  ┌────┴────────────────────────────────┴─────────┐   │
//!                      │  │                  dispatch                     │   │
//!                      │  └───────────────────────▲───────────────────────┘   │
//!                      │                          │                           │
//!                      │                 ┌────────┴────────┐                  │
//!                      │                 │  broker bridge  │◀─────────────────┼──── Redis
//!                      │                 │ backoff/resub   │    PSUBSCRIBE    │
//!                      │                 └─────────────────┘                  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use realtime_gateway::broker::RedisConnector;
use realtime_gateway::config::ConfigOverrides;
use realtime_gateway::lifecycle::{shutdown_signal, Shutdown};
use realtime_gateway::net;
use realtime_gateway::observability::{logging, metrics};
use realtime_gateway::Gateway;

#[derive(Debug, Parser)]
#[command(name = "realtime-gateway", version, about = "Pub/sub WebSocket gateway")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.overrides.resolve()?;

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        broker = %config.broker.url,
        "realtime-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let connector = Arc::new(RedisConnector::from_config(&config.broker)?);

    let listener = match net::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Cannot bind listen address");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let gateway = Arc::new(Gateway::new(config, connector));
    let mut server = tokio::spawn(gateway.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
        result = &mut server => {
            result??;
            return Ok(());
        }
    }

    // Server task ends once connections have drained.
    server.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
