//! Shared registry of live client connections
//!
//! Every accepted connection is registered here until it stops. The acceptor
//! uses the registry to fan a shutdown out to all connections, and the size
//! of the registry is the live-connection count.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};

/// Process-unique identity of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The registry's side of a connection: enough to identify it and to ask it
/// to stop. The socket itself stays with the connection task.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver its connection task listens on.
    pub fn new(id: ConnectionId, peer: SocketAddr) -> (Self, watch::Receiver<bool>) {
        let (shutdown, rx) = watch::channel(false);
        (Self { id, peer, shutdown }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Signals the connection task to close its socket. Repeated calls and
    /// calls after the task has exited are no-ops.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Mutex-guarded set of live connections.
///
/// Cloning is cheap and yields another reference to the same set. All
/// operations go through a single lock.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        let mut connections = self.connections.lock().await;
        connections.insert(handle.id(), handle);
    }

    /// Removes a connection. Returns `true` only for the call that actually
    /// removed it, so concurrent or repeated removals are harmless.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        connections.remove(&id).is_some()
    }

    /// Signals every registered connection to stop and empties the registry.
    ///
    /// Returns the number of connections that were signalled.
    pub async fn stop_all(&self) -> usize {
        let mut connections = self.connections.lock().await;
        let count = connections.len();
        for (_, handle) in connections.drain() {
            tracing::debug!(conn = %handle.id(), peer = %handle.peer(), "Stopping connection");
            handle.stop();
        }
        count
    }

    /// Live connection count.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }
}
