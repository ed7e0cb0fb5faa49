use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::clients::{ClientId, ConnectionManager};
use crate::error::{MalformedPayload, RelayError};
use crate::history::HistoryStore;
use crate::record::ChatRecord;

/// The relay: turns inbound frames into broadcasts and replays history.
///
/// Safe to drive from one task per client. Append-then-broadcast and
/// register-then-replay run under a single ordering gate, so every client
/// sees the same broadcast order and a new client's replay lands before
/// any broadcast that follows it.
pub struct Relay {
    clients: Arc<ConnectionManager>,
    history: Option<HistoryStore>,
    max_message_bytes: Option<usize>,
    gate: Mutex<()>,
}

impl Relay {
    /// Stateless variant: fan-out only, nothing replayed on connect.
    pub fn echo() -> Self {
        Self::new(None)
    }

    /// Stateful variant: every accepted record is kept and replayed.
    pub fn with_history() -> Self {
        Self::new(Some(HistoryStore::new()))
    }

    fn new(history: Option<HistoryStore>) -> Self {
        Self {
            clients: Arc::new(ConnectionManager::new()),
            history,
            max_message_bytes: None,
            gate: Mutex::new(()),
        }
    }

    /// Drop inbound frames longer than `limit` bytes.
    pub fn max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = Some(limit);
        self
    }

    pub fn keeps_history(&self) -> bool {
        self.history.is_some()
    }

    pub fn message_limit(&self) -> Option<usize> {
        self.max_message_bytes
    }

    pub fn clients(&self) -> &Arc<ConnectionManager> {
        &self.clients
    }

    pub async fn client_count(&self) -> usize {
        self.clients.len().await
    }

    /// Register a newly accepted client and run the connect hook.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let _gate = self.gate.lock().await;
        let (id, rx) = self.clients.register().await;
        if let Err(e) = self.handle_new_connection(id).await {
            warn!(client = %id, "Failed to replay history: {}", e);
        }
        (id, rx)
    }

    pub async fn disconnect(&self, id: ClientId) {
        self.clients.unregister(id).await;
    }

    /// Send the full history to `id` only. No-op without a history store.
    ///
    /// Callers other than [`Relay::connect`] get no ordering guarantee
    /// relative to concurrent broadcasts.
    pub async fn handle_new_connection(&self, id: ClientId) -> Result<(), RelayError> {
        let Some(history) = &self.history else {
            return Ok(());
        };

        let snapshot = history.snapshot().await;
        let payload = serde_json::to_string(&snapshot)?;
        debug!(client = %id, records = snapshot.len(), "Replaying history");
        self.clients.send_to(id, payload).await
    }

    /// Process one inbound frame from `from`.
    ///
    /// Returns how many clients the broadcast was queued for. Malformed
    /// frames are logged and returned as errors; nothing is sent and the
    /// sender's session is unaffected.
    pub async fn handle_message(&self, from: ClientId, raw: &str) -> Result<usize, RelayError> {
        let record = match self.accept(raw) {
            Ok(record) => record,
            Err(reason) => {
                warn!(client = %from, %reason, "dropped msg: {}", raw);
                return Err(reason.into());
            }
        };

        // Single-element array, never the whole history
        let payload = serde_json::to_string(std::slice::from_ref(&record))?;

        let _gate = self.gate.lock().await;
        if let Some(history) = &self.history {
            history.append(record).await;
        }
        let delivered = self.clients.broadcast_to_all(&payload).await;
        debug!(client = %from, delivered, "Broadcast message");
        Ok(delivered)
    }

    fn accept(&self, raw: &str) -> Result<ChatRecord, MalformedPayload> {
        if let Some(limit) = self.max_message_bytes {
            if raw.len() > limit {
                return Err(MalformedPayload::TooLarge {
                    len: raw.len(),
                    limit,
                });
            }
        }
        ChatRecord::accept(raw)
    }

    /// Current history, or `None` for the echo variant.
    pub async fn history_snapshot(&self) -> Option<Vec<ChatRecord>> {
        match &self.history {
            Some(history) => Some(history.snapshot().await),
            None => None,
        }
    }

    pub async fn history_len(&self) -> usize {
        match &self.history {
            Some(history) => history.len().await,
            None => 0,
        }
    }
}
