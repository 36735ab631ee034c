//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use realtime_gateway::broker::{BridgeState, BrokerConnector, BrokerError, BrokerMessage, BrokerStream};
use realtime_gateway::config::GatewayConfig;
use realtime_gateway::lifecycle::Shutdown;
use realtime_gateway::{Gateway, GatewayError};

pub const ORIGIN: &str = "http://localhost:3000";
pub const WAIT: Duration = Duration::from_secs(5);

/// In-memory stand-in for the Redis broker.
///
/// Applies the subscribed patterns the way `PSUBSCRIBE` does for the
/// trailing-`*` globs the gateway uses.
#[derive(Default)]
pub struct MemoryBroker {
    session: Mutex<Option<(Vec<String>, mpsc::UnboundedSender<BrokerMessage>)>>,
    connects: AtomicUsize,
    refusals: AtomicUsize,
    subscribed: Mutex<Vec<Vec<String>>>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish to the live session. Returns whether a session received it.
    pub fn publish(&self, channel: &str, message: &str) -> bool {
        let session = self.session.lock();
        match &*session {
            Some((patterns, tx)) if patterns.iter().any(|p| glob_match(p, channel)) => {
                tx.send(BrokerMessage::new(channel, message)).is_ok()
            }
            _ => false,
        }
    }

    /// Kill the live session, as if the broker connection dropped.
    pub fn drop_session(&self) {
        self.session.lock().take();
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Pattern sets passed to every successful connect, in order.
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.subscribed.lock().clone()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self, patterns: &[String]) -> Result<BrokerStream, BrokerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(BrokerError::Connect("connection refused".into()));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.session.lock() = Some((patterns.to_vec(), tx));
        self.subscribed.lock().push(patterns.to_vec());
        Ok(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

fn glob_match(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}

/// A gateway serving on an ephemeral port, backed by a [`MemoryBroker`].
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
    pub broker: Arc<MemoryBroker>,
    pub shutdown: Shutdown,
    task: JoinHandle<Result<(), GatewayError>>,
}

/// Configuration used by every test unless modified.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.origins.allowed = vec![ORIGIN.to_string(), "https://dashboard.example.com".to_string()];
    config.broker.base_delay_ms = 10;
    config.broker.max_delay_ms = 50;
    config
}

impl TestGateway {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let listener = realtime_gateway::net::bind(&config.listener).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = MemoryBroker::new();
        let gateway = Arc::new(Gateway::new(config, broker.clone()));
        let shutdown = Shutdown::new();
        let task = tokio::spawn(gateway.clone().run(listener, shutdown.subscribe()));

        let test = Self {
            addr,
            gateway,
            broker,
            shutdown,
            task,
        };
        test.wait_for_bridge(BridgeState::Subscribed).await;
        test
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn wait_for_bridge(&self, state: BridgeState) {
        let mut states = self.gateway.bridge().watch_state();
        tokio::time::timeout(WAIT, states.wait_for(|s| *s == state))
            .await
            .expect("bridge state reached")
            .expect("bridge alive");
    }

    /// Poll until `condition` holds.
    pub async fn eventually(&self, mut condition: impl FnMut(&Gateway) -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !condition(&self.gateway) {
            assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_for_subscribers(&self, topic: &str, count: usize) {
        self.eventually(|g| g.registry().subscribers_of(topic).len() == count)
            .await;
    }

    pub async fn wait_for_connections(&self, count: usize) {
        self.eventually(|g| g.registry().connection_count() == count)
            .await;
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("gateway stops")
            .expect("gateway task")
            .expect("gateway result");
    }
}
