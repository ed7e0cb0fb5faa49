use tokio::sync::RwLock;

use crate::record::ChatRecord;

/// Append-only record of every accepted message, in acceptance order.
///
/// Lives for the whole process and is never truncated.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: RwLock<Vec<ChatRecord>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: ChatRecord) {
        self.records.write().await.push(record);
    }

    /// Point-in-time copy of the full history.
    pub async fn snapshot(&self) -> Vec<ChatRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
