//! Per-connection lifecycle: admission, control frames, teardown.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::net::{ConnectionId, ConnectionState};
use crate::observability::metrics;
use crate::protocol::{ControlMessage, ProtocolError};
use crate::registry::{ConnectionHandle, ConnectionRegistry, RegistryError};

/// Applies connection events to the registry.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionLifecycle {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Admit a connection that passed the origin check.
    pub fn open(&self, handle: Arc<ConnectionHandle>) -> Result<ConnectionSession, RegistryError> {
        let _ = handle.transition(ConnectionState::Open);
        if let Err(e) = self.registry.register(handle.clone()) {
            let _ = handle.transition(ConnectionState::Closed);
            return Err(e);
        }

        let active = self.registry.connection_count();
        metrics::record_connection_opened(active);
        info!(connection_id = %handle.id(), active, "Connection opened");

        Ok(ConnectionSession {
            lifecycle: self.clone(),
            handle,
        })
    }

    /// Tear down `handle`. Safe to call for connections that never
    /// finished registering and safe to call more than once.
    pub fn close(&self, handle: &ConnectionHandle) {
        let previous = handle.transition(ConnectionState::Closed);
        if self.registry.unregister(handle.id()).is_some() {
            let active = self.registry.connection_count();
            metrics::record_connection_closed(active);
            info!(
                connection_id = %handle.id(),
                dropped = handle.drop_count(),
                age = ?handle.age(),
                active,
                "Connection closed"
            );
        } else if previous != ConnectionState::Closed {
            debug!(connection_id = %handle.id(), "Closed connection was not registered");
        }
    }
}

/// An admitted connection. Unregisters itself when dropped.
pub struct ConnectionSession {
    lifecycle: ConnectionLifecycle,
    handle: Arc<ConnectionHandle>,
}

impl ConnectionSession {
    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Apply one control message. Returns whether the registry changed.
    ///
    /// Subscription changes are ignored once the connection has left `Open`.
    pub fn apply(&self, message: ControlMessage) -> bool {
        let registry = &self.lifecycle.registry;
        match message {
            ControlMessage::Subscribe { topic } => {
                if self.handle.state() != ConnectionState::Open {
                    return false;
                }
                let changed = registry.subscribe(self.id(), &topic);
                if changed {
                    metrics::record_subscription("subscribe");
                    debug!(connection_id = %self.id(), topic = %topic, "Subscribed");
                }
                changed
            }
            ControlMessage::Unsubscribe { topic } => {
                if self.handle.state() != ConnectionState::Open {
                    return false;
                }
                let changed = registry.unsubscribe(self.id(), &topic);
                if changed {
                    metrics::record_subscription("unsubscribe");
                    debug!(connection_id = %self.id(), topic = %topic, "Unsubscribed");
                }
                changed
            }
            ControlMessage::Closed => {
                let was_registered = registry.contains(self.id());
                self.lifecycle.close(&self.handle);
                was_registered
            }
        }
    }

    /// Parse and apply a text frame. Malformed frames are logged and ignored.
    pub fn handle_text(&self, text: &str) {
        self.apply_parsed(ControlMessage::parse(text));
    }

    /// Same as [`handle_text`](Self::handle_text) for binary frames.
    pub fn handle_binary(&self, bytes: &[u8]) {
        self.apply_parsed(ControlMessage::parse_bytes(bytes));
    }

    fn apply_parsed(&self, parsed: Result<ControlMessage, ProtocolError>) {
        match parsed {
            Ok(message) => {
                self.apply(message);
            }
            Err(e) => {
                metrics::record_protocol_error();
                warn!(connection_id = %self.id(), error = %e, "Ignoring malformed frame");
            }
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.lifecycle.close(&self.handle);
    }
}
