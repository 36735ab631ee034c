//! Redis pub/sub connector.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use crate::broker::{BrokerConnector, BrokerError, BrokerMessage, BrokerStream};
use crate::config::BrokerConfig;

/// Connects to Redis and issues one `PSUBSCRIBE` per pattern.
pub struct RedisConnector {
    client: redis::Client,
    url: String,
    connect_timeout: Duration,
}

impl RedisConnector {
    /// Validate the URL; no connection is made until `connect`.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(|e| BrokerError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            connect_timeout,
        })
    }

    pub fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        Self::new(&config.url, Duration::from_millis(config.connect_timeout_ms))
    }

    async fn subscribe_all(&self, patterns: &[String]) -> Result<redis::aio::PubSub, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        for pattern in patterns {
            pubsub
                .psubscribe(pattern)
                .await
                .map_err(|e| BrokerError::Subscribe {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            debug!(pattern = %pattern, "Pattern subscribed");
        }
        Ok(pubsub)
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    /// The whole handshake, connect plus every `PSUBSCRIBE`, shares one
    /// deadline.
    async fn connect(&self, patterns: &[String]) -> Result<BrokerStream, BrokerError> {
        let pubsub = tokio::time::timeout(self.connect_timeout, self.subscribe_all(patterns))
            .await
            .map_err(|_| BrokerError::Timeout(self.connect_timeout))??;

        let stream = pubsub.into_on_message().map(|msg| BrokerMessage {
            channel: msg.get_channel_name().to_string(),
            payload: msg.get_payload_bytes().to_vec(),
        });
        Ok(stream.boxed())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn rejects_malformed_url() {
        assert!(RedisConnector::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn accepts_redis_url_without_connecting() {
        let connector = RedisConnector::from_config(&BrokerConfig {
            url: "redis://127.0.0.1:6390".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(connector.describe(), "redis://127.0.0.1:6390");
        assert_eq!(connector.connect_timeout, Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn unresponsive_broker_times_out() {
        // Completes the TCP handshake from the backlog but never answers.
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}", silent.local_addr().unwrap());
        let connector = RedisConnector::new(&url, Duration::from_millis(100)).unwrap();

        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            connector.connect(&["scraper_*".to_string()]),
        )
        .await
        .expect("connect gives up on its own");

        assert!(matches!(result, Err(BrokerError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(silent);
    }
}
