//! Connection → topics map with an inverted topic → connections index.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::net::ConnectionId;
use crate::registry::handle::ConnectionHandle;

/// Errors from registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

struct Entry {
    handle: Arc<ConnectionHandle>,
    topics: HashSet<String>,
}

#[derive(Default)]
struct Indices {
    connections: HashMap<ConnectionId, Entry>,
    topics: HashMap<String, HashSet<ConnectionId>>,
}

impl Indices {
    fn remove_from_topic(&mut self, topic: &str, id: ConnectionId) {
        if let Some(members) = self.topics.get_mut(topic) {
            members.remove(&id);
            if members.is_empty() {
                self.topics.remove(topic);
            }
        }
    }
}

/// Authoritative record of live connections and their subscriptions.
///
/// Both indices sit behind a single lock and every mutation updates them in
/// the same critical section, so a reader never sees one updated without
/// the other.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Indices>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection with an empty subscription set.
    ///
    /// Registering the same id twice is refused and leaves the existing
    /// entry untouched.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Result<(), RegistryError> {
        let id = handle.id();
        let mut inner = self.inner.write();
        if inner.connections.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        inner.connections.insert(
            id,
            Entry {
                handle,
                topics: HashSet::new(),
            },
        );
        debug!(connection_id = %id, connections = inner.connections.len(), "Connection registered");
        Ok(())
    }

    /// Add `topic` to the connection's set.
    ///
    /// Returns `false` if the connection is unknown or already subscribed.
    pub fn subscribe(&self, id: ConnectionId, topic: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(entry) = inner.connections.get_mut(&id) else {
            return false;
        };
        if !entry.topics.insert(topic.to_string()) {
            return false;
        }
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(id);
        true
    }

    /// Remove `topic` from the connection's set.
    ///
    /// Returns `false` if the connection is unknown or was not subscribed.
    pub fn unsubscribe(&self, id: ConnectionId, topic: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(entry) = inner.connections.get_mut(&id) else {
            return false;
        };
        if !entry.topics.remove(topic) {
            return false;
        }
        inner.remove_from_topic(topic, id);
        true
    }

    /// Remove the connection and all of its subscriptions. Idempotent.
    ///
    /// Returns the handle if the connection was registered.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let mut inner = self.inner.write();
        let entry = inner.connections.remove(&id)?;
        for topic in &entry.topics {
            inner.remove_from_topic(topic, id);
        }
        debug!(
            connection_id = %id,
            topics = entry.topics.len(),
            connections = inner.connections.len(),
            "Connection unregistered"
        );
        Some(entry.handle)
    }

    /// Point-in-time snapshot of the connections subscribed to `topic`.
    ///
    /// The returned handles stay valid to iterate while the registry keeps
    /// changing underneath.
    pub fn subscribers_of(&self, topic: &str) -> Vec<Arc<ConnectionHandle>> {
        let inner = self.inner.read();
        let Some(members) = inner.topics.get(topic) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .map(|entry| Arc::clone(&entry.handle))
            .collect()
    }

    /// Topics the connection is subscribed to, or `None` if unknown.
    pub fn topics_of(&self, id: ConnectionId) -> Option<Vec<String>> {
        let inner = self.inner.read();
        inner
            .connections
            .get(&id)
            .map(|entry| entry.topics.iter().cloned().collect())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().connections.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Number of distinct topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.read().topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionState;
    use std::thread;

    fn handle() -> Arc<ConnectionHandle> {
        let (handle, _rx) = ConnectionHandle::channel(8);
        let _ = handle.transition(ConnectionState::Open);
        handle
    }

    fn ids(handles: &[Arc<ConnectionHandle>]) -> HashSet<ConnectionId> {
        handles.iter().map(|h| h.id()).collect()
    }

    #[test]
    fn register_starts_with_no_topics() {
        let registry = ConnectionRegistry::new();
        let conn = handle();
        registry.register(conn.clone()).unwrap();

        assert!(registry.contains(conn.id()));
        assert_eq!(registry.topics_of(conn.id()), Some(vec![]));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn double_register_is_refused() {
        let registry = ConnectionRegistry::new();
        let conn = handle();
        registry.register(conn.clone()).unwrap();
        assert!(registry.subscribe(conn.id(), "scraper_logs"));

        let err = registry.register(conn.clone()).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(conn.id()));
        assert_eq!(registry.topics_of(conn.id()), Some(vec!["scraper_logs".to_string()]));
    }

    #[test]
    fn subscribe_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let conn = handle();
        registry.register(conn.clone()).unwrap();

        assert!(registry.subscribe(conn.id(), "scraper_logs"));
        assert!(!registry.subscribe(conn.id(), "scraper_logs"));
        assert_eq!(registry.subscribers_of("scraper_logs").len(), 1);
    }

    #[test]
    fn mutations_on_unknown_connection_are_noops() {
        let registry = ConnectionRegistry::new();
        let stranger = ConnectionId::new();

        assert!(!registry.subscribe(stranger, "scraper_logs"));
        assert!(!registry.unsubscribe(stranger, "scraper_logs"));
        assert!(registry.unregister(stranger).is_none());
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn subscribers_are_exact_matches() {
        let registry = ConnectionRegistry::new();
        let a = handle();
        let b = handle();
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();

        registry.subscribe(a.id(), "scraper_logs");
        registry.subscribe(b.id(), "scraper_logs_archive");
        registry.subscribe(b.id(), "dashboard_summary");

        assert_eq!(ids(&registry.subscribers_of("scraper_logs")), HashSet::from([a.id()]));
        assert_eq!(ids(&registry.subscribers_of("dashboard_summary")), HashSet::from([b.id()]));
        assert!(registry.subscribers_of("scraper_*").is_empty());
        assert!(registry.subscribers_of("scraper").is_empty());
    }

    #[test]
    fn unsubscribe_prunes_empty_topics() {
        let registry = ConnectionRegistry::new();
        let conn = handle();
        registry.register(conn.clone()).unwrap();

        registry.subscribe(conn.id(), "scraper_logs");
        assert_eq!(registry.topic_count(), 1);

        assert!(registry.unsubscribe(conn.id(), "scraper_logs"));
        assert!(!registry.unsubscribe(conn.id(), "scraper_logs"));
        assert_eq!(registry.topic_count(), 0);
        assert!(registry.subscribers_of("scraper_logs").is_empty());
    }

    #[test]
    fn unregister_removes_every_index_entry() {
        let registry = ConnectionRegistry::new();
        let a = handle();
        let b = handle();
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();
        for topic in ["scraper_logs", "dashboard_summary", "enrichment_status"] {
            registry.subscribe(a.id(), topic);
        }
        registry.subscribe(b.id(), "scraper_logs");

        assert!(registry.unregister(a.id()).is_some());
        assert!(registry.unregister(a.id()).is_none());

        assert!(!registry.contains(a.id()));
        assert_eq!(ids(&registry.subscribers_of("scraper_logs")), HashSet::from([b.id()]));
        assert!(registry.subscribers_of("dashboard_summary").is_empty());
        assert_eq!(registry.topic_count(), 1);
    }

    #[test]
    fn snapshot_survives_concurrent_unregister() {
        let registry = ConnectionRegistry::new();
        let conn = handle();
        registry.register(conn.clone()).unwrap();
        registry.subscribe(conn.id(), "scraper_logs");

        let snapshot = registry.subscribers_of("scraper_logs");
        registry.unregister(conn.id());

        assert_eq!(snapshot.len(), 1);
        assert!(registry.subscribers_of("scraper_logs").is_empty());
    }

    #[test]
    fn concurrent_mutation_keeps_indices_consistent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8).map(|_| handle()).collect();
        for h in &handles {
            registry.register(h.clone()).unwrap();
        }

        let workers: Vec<_> = handles
            .iter()
            .map(|h| {
                let registry = registry.clone();
                let id = h.id();
                thread::spawn(move || {
                    for i in 0..200 {
                        let topic = format!("scraper_{}", i % 5);
                        registry.subscribe(id, &topic);
                        let _ = registry.subscribers_of(&topic);
                        if i % 3 == 0 {
                            registry.unsubscribe(id, &topic);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        for h in &handles {
            for topic in registry.topics_of(h.id()).unwrap() {
                assert!(ids(&registry.subscribers_of(&topic)).contains(&h.id()));
            }
        }
        for h in &handles {
            registry.unregister(h.id());
        }
        assert_eq!(registry.topic_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }
}
