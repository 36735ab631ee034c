//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connections_total` (counter): admitted connections
//! - `gateway_connections_rejected_total` (counter): refused handshakes by reason
//! - `gateway_active_connections` (gauge): currently registered connections
//! - `gateway_subscriptions_total` (counter): subscription changes by action
//! - `gateway_protocol_errors_total` (counter): ignored client frames
//! - `gateway_broker_messages_total` (counter): broker events received
//! - `gateway_deliveries_total` (counter): per-connection outcomes
//! - `gateway_broker_reconnects_total` (counter): broker reconnect attempts

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_opened(active: usize) {
    counter!("gateway_connections_total").increment(1);
    gauge!("gateway_active_connections").set(active as f64);
}

pub fn record_connection_closed(active: usize) {
    gauge!("gateway_active_connections").set(active as f64);
}

pub fn record_rejected(reason: &'static str) {
    counter!("gateway_connections_rejected_total", "reason" => reason).increment(1);
}

pub fn record_subscription(action: &'static str) {
    counter!("gateway_subscriptions_total", "action" => action).increment(1);
}

pub fn record_protocol_error() {
    counter!("gateway_protocol_errors_total").increment(1);
}

pub fn record_broker_message() {
    counter!("gateway_broker_messages_total").increment(1);
}

pub fn record_deliveries(outcome: &'static str, count: usize) {
    if count > 0 {
        counter!("gateway_deliveries_total", "outcome" => outcome).increment(count as u64);
    }
}

pub fn record_broker_reconnect() {
    counter!("gateway_broker_reconnects_total").increment(1);
}
