//! Minimal client for the realtime gateway's WebSocket protocol.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid origin header: {0}")]
    Origin(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),
}

/// A message delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub message: String,
}

/// What the gateway sent next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(Envelope),
    /// The gateway closed the socket; `code` is absent if no close frame arrived.
    Closed { code: Option<u16>, reason: String },
}

#[derive(Serialize)]
struct Control<'a> {
    action: &'a str,
    topic: &'a str,
}

pub struct GatewayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GatewayClient {
    /// Open a WebSocket to `url`, sending `origin` as the `Origin` header
    /// when given.
    pub async fn connect(url: &str, origin: Option<&str>) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert(header::ORIGIN, HeaderValue::from_str(origin)?);
        }
        let (stream, _response) = connect_async(request).await?;
        Ok(Self { stream })
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.control("subscribe", topic).await
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.control("unsubscribe", topic).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), ClientError> {
        self.stream.send(Message::text(text.to_owned())).await?;
        Ok(())
    }

    /// Next envelope or close, skipping control frames.
    pub async fn next_event(&mut self) -> Result<Event, ClientError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Event::Message(serde_json::from_str(text.as_str())?));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(match frame {
                        Some(frame) => Event::Closed {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.to_string(),
                        },
                        None => Event::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Ok(Event::Closed {
                        code: None,
                        reason: String::new(),
                    })
                }
            }
        }
    }

    /// Next envelope, or `None` once the gateway has closed the socket.
    pub async fn next_envelope(&mut self) -> Result<Option<Envelope>, ClientError> {
        match self.next_event().await? {
            Event::Message(envelope) => Ok(Some(envelope)),
            Event::Closed { .. } => Ok(None),
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn control(&mut self, action: &str, topic: &str) -> Result<(), ClientError> {
        let frame = serde_json::to_string(&Control { action, topic })?;
        self.send_raw(&frame).await
    }
}
