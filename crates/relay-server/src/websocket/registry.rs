//! Registry of live connections.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::{Connection, ConnectionId, Outbound};

/// The set of currently registered connections.
///
/// All access goes through this type; the backing map is never handed out.
/// Enumeration runs under the read lock, so callbacks must not block or
/// re-enter the registry for writing.
pub struct ConnectionRegistry {
    connections: RwLock<BTreeMap<ConnectionId, Arc<Connection>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry. The first identifier handed out is `1`.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection whose writer drains `tx` and which is torn down
    /// when `terminate` is cancelled.
    ///
    /// Assigns the next identifier and stores the connection as `Open` with
    /// `alive = true`.
    pub fn register(
        &self,
        tx: mpsc::Sender<Outbound>,
        terminate: CancellationToken,
    ) -> Arc<Connection> {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connection = Arc::new(Connection::new(id, tx, terminate));
        let _ = connection.open();
        let count = {
            let mut conns = self.connections.write();
            let _ = conns.insert(id, connection.clone());
            conns.len()
        };
        debug!(conn_id = %id, connections = count, "connection registered");
        connection
    }

    /// Remove a connection by identifier.
    ///
    /// Absent identifiers are a no-op: a close can race with eviction.
    /// Returns `true` if this call removed the entry.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().remove(&id);
        if removed.is_some() {
            debug!(conn_id = %id, "connection unregistered");
        }
        removed.is_some()
    }

    /// Invoke `f` for every registered connection.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for conn in self.connections.read().values() {
            f(conn);
        }
    }

    /// Invoke `f` for every registered connection except `excluded`.
    pub fn for_each_except<F>(&self, excluded: ConnectionId, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for (id, conn) in self.connections.read().iter() {
            if *id != excluded {
                f(conn);
            }
        }
    }

    /// Look up a connection.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().get(&id).cloned()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Registered identifiers in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.read().keys().copied().collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Terminate and remove every connection. Returns how many were removed.
    pub fn terminate_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.connections.write());
        for conn in drained.values() {
            conn.terminate();
        }
        drained.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
