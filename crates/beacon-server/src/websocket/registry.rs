//! Registry of open connections and their viewer state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use beacon_core::{ConnectionId, ViewerState};
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::ClientConnection;

/// Open connections indexed by connection ID.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            count: AtomicUsize::new(0),
        }
    }

    /// Add a connection with empty viewer state.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        connection.set_viewer(ViewerState::default());
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Look up a connection.
    pub async fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Replace a registered connection's viewer state.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn update(&self, id: &ConnectionId, state: ViewerState) -> bool {
        match self.connections.read().await.get(id) {
            Some(conn) => {
                conn.set_viewer(state);
                true
            }
            None => false,
        }
    }

    /// Remove a connection. Presence records are untouched.
    pub async fn unregister(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().await.remove(id);
        if removed.is_some() {
            let _ = self.count.fetch_sub(1, Ordering::Relaxed);
            debug!(conn_id = %id, "connection unregistered");
        }
        removed
    }

    /// Snapshot of every connection paired with its viewer state.
    pub async fn all(&self) -> Vec<(Arc<ClientConnection>, ViewerState)> {
        self.connections
            .read()
            .await
            .values()
            .map(|c| (c.clone(), c.viewer()))
            .collect()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
