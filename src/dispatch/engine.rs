//! Exact-match fan-out of broker messages to subscribed connections.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::BrokerMessage;
use crate::config::BackpressurePolicy;
use crate::observability::metrics;
use crate::protocol::Envelope;
use crate::registry::{ConnectionRegistry, SendOutcome};

/// Summary of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub channel: String,
    /// Connections subscribed to the channel at the instant of dispatch.
    pub matched: usize,
    pub delivered: usize,
    /// Full or closed queues.
    pub dropped: usize,
    /// Connections asked to close under `CloseConnection`.
    pub closed: usize,
}

/// Delivers broker messages to the connections subscribed to their channel.
///
/// Only reads the registry. Every enqueue is non-blocking, so one slow
/// connection never holds up the rest.
pub struct DispatchEngine {
    registry: Arc<ConnectionRegistry>,
    policy: BackpressurePolicy,
}

impl DispatchEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, policy: BackpressurePolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn dispatch(&self, message: &BrokerMessage) -> DispatchReport {
        metrics::record_broker_message();

        let mut report = DispatchReport {
            channel: message.channel.clone(),
            ..Default::default()
        };

        let subscribers = self.registry.subscribers_of(&message.channel);
        report.matched = subscribers.len();
        if subscribers.is_empty() {
            debug!(channel = %message.channel, "No subscribers for channel");
            return report;
        }

        let payload = message.payload_str();
        let frame = match Envelope::new(&message.channel, &payload).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "Failed to encode envelope");
                return report;
            }
        };

        for conn in subscribers {
            match conn.try_send(frame.clone()) {
                SendOutcome::Queued => report.delivered += 1,
                SendOutcome::Full => {
                    report.dropped += 1;
                    match self.policy {
                        BackpressurePolicy::DropMessage => {
                            warn!(
                                connection_id = %conn.id(),
                                channel = %message.channel,
                                dropped_total = conn.drop_count(),
                                "Outbound queue full, message dropped"
                            );
                        }
                        BackpressurePolicy::CloseConnection => {
                            warn!(
                                connection_id = %conn.id(),
                                channel = %message.channel,
                                "Outbound queue full, closing connection"
                            );
                            conn.request_close();
                            report.closed += 1;
                        }
                    }
                }
                SendOutcome::Closed => {
                    report.dropped += 1;
                    debug!(connection_id = %conn.id(), channel = %message.channel, "Connection closing, message dropped");
                }
            }
        }

        metrics::record_deliveries("delivered", report.delivered);
        metrics::record_deliveries("dropped", report.dropped);

        debug!(
            channel = %report.channel,
            matched = report.matched,
            delivered = report.delivered,
            dropped = report.dropped,
            "Dispatched broker message"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionState;
    use crate::registry::{ConnectionHandle, OutboundFrame};
    use tokio::sync::mpsc;

    fn connect(
        registry: &ConnectionRegistry,
        capacity: usize,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        let (handle, rx) = ConnectionHandle::channel(capacity);
        let _ = handle.transition(ConnectionState::Open);
        registry.register(handle.clone()).unwrap();
        (handle, rx)
    }

    fn message(channel: &str, payload: &str) -> BrokerMessage {
        BrokerMessage::new(channel, payload.as_bytes().to_vec())
    }

    #[test]
    fn delivers_envelope_to_exact_subscribers_only() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (a, mut a_rx) = connect(&registry, 8);
        let (b, mut b_rx) = connect(&registry, 8);
        registry.subscribe(a.id(), "scraper_logs");
        registry.subscribe(b.id(), "dashboard_summary");

        let report = engine.dispatch(&message("scraper_logs", "hello"));

        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            &*a_rx.try_recv().unwrap(),
            r#"{"channel":"scraper_logs","message":"hello"}"#
        );
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn fan_out_shares_one_encoded_buffer() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (a, mut a_rx) = connect(&registry, 8);
        let (b, mut b_rx) = connect(&registry, 8);
        registry.subscribe(a.id(), "dashboard_summary");
        registry.subscribe(b.id(), "dashboard_summary");

        engine.dispatch(&message("dashboard_summary", "{\"jobs\":3}"));

        let a_frame = a_rx.try_recv().unwrap();
        let b_frame = b_rx.try_recv().unwrap();
        assert_eq!(a_frame, b_frame);
        assert_eq!(a_frame.as_str().as_ptr(), b_frame.as_str().as_ptr());
    }

    #[test]
    fn unsubscribed_connection_receives_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (a, mut a_rx) = connect(&registry, 8);
        registry.subscribe(a.id(), "scraper_logs");
        registry.unsubscribe(a.id(), "scraper_logs");

        let report = engine.dispatch(&message("scraper_logs", "hello"));

        assert_eq!(report.matched, 0);
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn blocked_connection_does_not_stall_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (stuck, _stuck_rx) = connect(&registry, 1);
        let (b, mut b_rx) = connect(&registry, 8);
        let (c, mut c_rx) = connect(&registry, 8);
        for conn in [&stuck, &b, &c] {
            registry.subscribe(conn.id(), "enrichment_status");
        }
        // Nobody drains the stuck queue; fill it.
        engine.dispatch(&message("enrichment_status", "first"));
        b_rx.try_recv().unwrap();
        c_rx.try_recv().unwrap();

        let report = engine.dispatch(&message("enrichment_status", "second"));

        assert_eq!(report.matched, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.closed, 0);
        assert!(b_rx.try_recv().unwrap().contains("second"));
        assert!(c_rx.try_recv().unwrap().contains("second"));
        assert!(!stuck.is_close_requested());
        assert_eq!(stuck.drop_count(), 1);
    }

    #[test]
    fn close_policy_evicts_slow_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::CloseConnection);
        let (slow, _slow_rx) = connect(&registry, 1);
        let (fast, mut fast_rx) = connect(&registry, 8);
        registry.subscribe(slow.id(), "scraper_logs");
        registry.subscribe(fast.id(), "scraper_logs");

        engine.dispatch(&message("scraper_logs", "1"));
        let report = engine.dispatch(&message("scraper_logs", "2"));

        assert_eq!(report.closed, 1);
        assert!(slow.is_close_requested());
        assert!(!fast.is_close_requested());
        // Dispatch never mutates the registry itself.
        assert!(registry.contains(slow.id()));
        assert!(fast_rx.try_recv().unwrap().contains("\"1\""));
        assert!(fast_rx.try_recv().unwrap().contains("\"2\""));
    }

    #[test]
    fn per_channel_order_is_preserved() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (a, mut rx) = connect(&registry, 16);
        registry.subscribe(a.id(), "scraper_logs");

        for i in 0..10 {
            engine.dispatch(&message("scraper_logs", &i.to_string()));
        }
        for i in 0..10 {
            let frame = rx.try_recv().unwrap();
            assert_eq!(
                &*frame,
                format!(r#"{{"channel":"scraper_logs","message":"{i}"}}"#)
            );
        }
    }

    #[test]
    fn closed_connection_is_never_targeted() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DispatchEngine::new(registry.clone(), BackpressurePolicy::DropMessage);
        let (a, mut rx) = connect(&registry, 8);
        registry.subscribe(a.id(), "scraper_logs");
        registry.unregister(a.id());

        let report = engine.dispatch(&message("scraper_logs", "late"));

        assert_eq!(report.matched, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(a.drop_count(), 0);
    }
}
