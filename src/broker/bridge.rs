//! Long-lived broker link feeding the dispatch engine.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{BrokerConnector, BrokerStream};
use crate::dispatch::DispatchEngine;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::ReconnectPolicy;

/// Where the bridge is in its connect/consume/backoff cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    /// Every pattern is subscribed and messages are flowing.
    Subscribed,
    /// Waiting before the next reconnect attempt.
    Backoff,
    Stopped,
}

/// Consumes broker messages and hands each one to dispatch in arrival order.
///
/// Connection loss never ends the bridge; it backs off and reconnects until
/// shutdown.
pub struct BrokerBridge {
    connector: Arc<dyn BrokerConnector>,
    patterns: Vec<String>,
    dispatch: Arc<DispatchEngine>,
    policy: ReconnectPolicy,
    state: watch::Sender<BridgeState>,
}

impl BrokerBridge {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        patterns: Vec<String>,
        dispatch: Arc<DispatchEngine>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Connecting);
        Self {
            connector,
            patterns,
            dispatch,
            policy,
            state,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Spawn [`run`](Self::run) onto the runtime.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Connect, subscribe, consume; on any failure back off and repeat.
    /// Returns only once `shutdown` fires.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        let target = self.connector.describe();
        let mut attempt: u32 = 0;

        loop {
            self.set_state(BridgeState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect(&self.patterns) => result,
                _ = shutdown.recv() => break,
            };

            match connected {
                Ok(stream) => {
                    attempt = 0;
                    self.set_state(BridgeState::Subscribed);
                    info!(
                        broker = %target,
                        patterns = ?self.patterns,
                        "Broker subscribed"
                    );

                    if self.consume(stream, &mut shutdown).await {
                        break;
                    }
                    warn!(broker = %target, "Broker stream ended");
                }
                Err(e) => {
                    warn!(broker = %target, error = %e, "Broker connection failed");
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.policy.delay(attempt);
            self.set_state(BridgeState::Backoff);
            metrics::record_broker_reconnect();
            info!(attempt, delay = ?delay, "Reconnecting to broker");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        self.set_state(BridgeState::Stopped);
        info!("Broker bridge stopped");
    }

    /// Drain the stream into dispatch. Returns `true` if stopped by shutdown.
    async fn consume(&self, mut stream: BrokerStream, shutdown: &mut ShutdownSignal) -> bool {
        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(message) => {
                        let report = self.dispatch.dispatch(&message);
                        debug!(channel = %report.channel, delivered = report.delivered, "Broker message handled");
                    }
                    None => return false,
                },
                _ = shutdown.recv() => return true,
            }
        }
    }

    fn set_state(&self, next: BridgeState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
