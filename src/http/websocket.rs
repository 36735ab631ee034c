//! WebSocket connection handling.
//!
//! # Responsibilities
//! - Admit or refuse the handshake (origin, connection cap)
//! - Translate socket events into control messages
//! - Drain the connection's outbound queue with bounded writes
//! - Ping idle peers and drop the ones that stop answering
//! - Close the socket on client close, write failure, backpressure or shutdown
//!
//! # Design Decisions
//! - Refusals complete the upgrade and then send a close frame, so browsers
//!   see the close code
//! - One writer task per connection; the reader never writes frames itself
//! - Teardown unregisters before the writer is aborted

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::protocol::ControlMessage;
use crate::registry::{ConnectionHandle, OutboundFrame};
use crate::security::{CONNECTION_LIMIT_CLOSE_CODE, FORBIDDEN_ORIGIN_CLOSE_CODE};

type Sink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Why a connection's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    ReadError,
    Unresponsive,
    WriteFailed,
    Backpressure,
    Shutdown,
}

/// Upgrade handler for `/` and `/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if !state.gateway.origins().is_allowed(origin.as_deref()) {
        metrics::record_rejected("forbidden_origin");
        warn!(origin = ?origin, "Rejected handshake from forbidden origin");
        return ws.on_upgrade(|socket| {
            refuse(socket, FORBIDDEN_ORIGIN_CLOSE_CODE, "forbidden origin")
        });
    }

    let Some(permit) = state.gateway.limiter().try_acquire() else {
        metrics::record_rejected("connection_limit");
        warn!(
            max_connections = state.gateway.limiter().max(),
            "Rejected handshake, connection limit reached"
        );
        return ws.on_upgrade(|socket| {
            refuse(socket, CONNECTION_LIMIT_CLOSE_CODE, "connection limit reached")
        });
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, permit))
}

/// Close a refused socket before any data frame is sent.
async fn refuse(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send refusal close frame");
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, _permit: OwnedSemaphorePermit) {
    let gateway = &state.gateway;
    let settings = &gateway.config().connection;
    let write_timeout = Duration::from_millis(settings.write_timeout_ms);
    let ping_interval = Duration::from_millis(settings.ping_interval_ms);
    let liveness = ping_interval + Duration::from_millis(settings.pong_timeout_ms);

    let (handle, outbound) = ConnectionHandle::channel(settings.send_buffer);
    let session = match gateway.lifecycle().open(handle.clone()) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Failed to register connection");
            return;
        }
    };
    let id = session.id();

    let (ws_tx, mut ws_rx) = socket.split();
    let sink: Sink = Arc::new(Mutex::new(ws_tx));
    let mut writer = tokio::spawn(write_loop(handle.clone(), outbound, sink.clone(), write_timeout));

    let mut heartbeat = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let mut shutdown = state.shutdown.clone();
    let exit = loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                if matches!(incoming, Some(Ok(_))) {
                    last_seen = Instant::now();
                }
                match incoming {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => session.handle_binary(&bytes),
                    Some(Ok(Message::Close(_))) | None => break Exit::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "WebSocket read error");
                        break Exit::ReadError;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > liveness {
                    warn!(connection_id = %id, silent_for = ?last_seen.elapsed(), "Peer stopped answering pings");
                    break Exit::Unresponsive;
                }
                if !send_ping(&sink, write_timeout).await {
                    break Exit::Unresponsive;
                }
            }
            _ = handle.close_requested() => break Exit::Backpressure,
            _ = &mut writer => break Exit::WriteFailed,
            _ = shutdown.recv() => break Exit::Shutdown,
        }
    };

    // Stop dispatch from targeting this connection before the writer goes.
    session.apply(ControlMessage::Closed);

    if exit != Exit::WriteFailed {
        writer.abort();
        let _ = writer.await;
    }

    let close = match exit {
        Exit::Backpressure => Some((close_code::POLICY, "outbound queue overflow")),
        Exit::Shutdown => Some((close_code::AWAY, "server shutting down")),
        _ => None,
    };
    if let Some((code, reason)) = close {
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        };
        let mut sink = sink.lock().await;
        if let Ok(Err(e)) = tokio::time::timeout(write_timeout, sink.send(Message::Close(Some(frame)))).await {
            debug!(connection_id = %id, error = %e, "Failed to send close frame");
        }
    }

    info!(connection_id = %id, reason = ?exit, "WebSocket session ended");
}

/// Returns false when the ping could not be written in time.
async fn send_ping(sink: &Sink, write_timeout: Duration) -> bool {
    let ping = async {
        let mut sink = sink.lock().await;
        sink.send(Message::Ping(Default::default())).await
    };
    matches!(tokio::time::timeout(write_timeout, ping).await, Ok(Ok(())))
}

/// Drain the outbound queue into the socket. Returns on a failed or
/// timed-out write, or when the queue closes.
async fn write_loop(
    handle: Arc<ConnectionHandle>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    sink: Sink,
    write_timeout: Duration,
) {
    while let Some(frame) = outbound.recv().await {
        let mut sink = sink.lock().await;
        match tokio::time::timeout(write_timeout, sink.send(Message::Text(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %handle.id(), error = %e, "WebSocket write failed");
                break;
            }
            Err(_) => {
                warn!(
                    connection_id = %handle.id(),
                    timeout = ?write_timeout,
                    "WebSocket write timed out"
                );
                break;
            }
        }
    }
}
