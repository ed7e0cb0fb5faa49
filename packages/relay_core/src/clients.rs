use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use crate::error::RelayError;

/// Unique identifier for a connected client
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Live set of connected clients and their outbound queues.
///
/// Every client gets an unbounded queue; the transport drains it into the
/// socket. Sends never block, and a client that went away is skipped.
pub struct ConnectionManager {
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a client to the live set and hand back its outbound queue.
    pub async fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.insert(id, tx);
        debug!(client = %id, "Registered client");
        (id, rx)
    }

    /// Remove a client. Dropping its sender closes the outbound queue.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().await.remove(&id).is_some();
        if removed {
            debug!(client = %id, "Unregistered client");
        }
        removed
    }

    /// Deliver `text` to exactly one client.
    pub async fn send_to(&self, id: ClientId, text: String) -> Result<(), RelayError> {
        let clients = self.clients.read().await;
        let tx = clients.get(&id).ok_or(RelayError::StaleClient(id))?;
        tx.send(text).map_err(|_| RelayError::StaleClient(id))
    }

    /// Deliver `text` to every client live at call time.
    ///
    /// Returns the number of clients the payload was queued for.
    pub async fn broadcast_to_all(&self, text: &str) -> usize {
        // Copy the set so concurrent connects/disconnects can't alter it mid-send
        let targets: Vec<(ClientId, mpsc::UnboundedSender<String>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            if tx.send(text.to_string()).is_ok() {
                delivered += 1;
            } else {
                debug!(client = %id, "Skipping stale client during broadcast");
            }
        }
        delivered
    }

    pub async fn is_connected(&self, id: ClientId) -> bool {
        self.clients.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
