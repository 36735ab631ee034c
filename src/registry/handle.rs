//! Per-connection handle shared between the registry, dispatch and the
//! connection's own socket tasks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, Notify};

use crate::net::{AtomicConnectionState, ConnectionId, ConnectionState};

/// A serialized frame ready to be written to a client.
///
/// Clones share one buffer, so a fan-out enqueues the same bytes everywhere.
pub type OutboundFrame = Utf8Bytes;

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// The outbound queue is at capacity.
    Full,
    /// The writer is gone or the connection is no longer open.
    Closed,
}

/// Represents one accepted client link.
///
/// Holds the sending half of the connection's bounded outbound queue; the
/// receiving half is drained by a dedicated writer task.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<OutboundFrame>,
    state: AtomicConnectionState,
    close_requested: AtomicBool,
    close_notify: Notify,
    dropped_messages: AtomicU64,
    connected_at: Instant,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self::with_id(ConnectionId::new(), tx)
    }

    pub fn with_id(id: ConnectionId, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id,
            tx,
            state: AtomicConnectionState::new(ConnectionState::Connecting),
            close_requested: AtomicBool::new(false),
            close_notify: Notify::new(),
            dropped_messages: AtomicU64::new(0),
            connected_at: Instant::now(),
        }
    }

    /// Create a handle together with its queue receiver.
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self::new(tx)), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    pub(crate) fn transition(&self, next: ConnectionState) -> ConnectionState {
        self.state.transition(next)
    }

    /// Enqueue a frame without waiting.
    ///
    /// A full or closed queue increments the dropped message counter.
    pub fn try_send(&self, frame: OutboundFrame) -> SendOutcome {
        if self.state() != ConnectionState::Open {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            return SendOutcome::Closed;
        }
        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(err) => {
                self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                match err {
                    mpsc::error::TrySendError::Full(_) => SendOutcome::Full,
                    mpsc::error::TrySendError::Closed(_) => SendOutcome::Closed,
                }
            }
        }
    }

    /// Ask the connection's socket task to close. Idempotent.
    pub fn request_close(&self) {
        if !self.close_requested.swap(true, Ordering::AcqRel) {
            self.close_notify.notify_one();
        }
    }

    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    /// Resolves once `request_close` has been called.
    pub async fn close_requested(&self) {
        if self.is_close_requested() {
            return;
        }
        self.close_notify.notified().await;
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
