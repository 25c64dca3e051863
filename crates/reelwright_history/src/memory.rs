//! In-memory history.

use crate::HistoryStore;
use async_trait::async_trait;
use reelwright_core::{ProductionRecord, RecordId};
use reelwright_error::{InputError, ReelwrightResult};
use tokio::sync::Mutex;

/// Volatile history; holds records in append order.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<Vec<ProductionRecord>>,
}

impl InMemoryHistoryStore {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// History pre-filled with records, oldest first.
    pub fn with_records(records: Vec<ProductionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Every record in append order.
    pub async fn snapshot(&self) -> Vec<ProductionRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: &ProductionRecord) -> ReelwrightResult<RecordId> {
        if !record.is_final() {
            return Err(InputError::new(format!(
                "record {} is still in progress and cannot enter history",
                record.id()
            ))
            .into());
        }
        self.records.lock().await.push(record.clone());
        Ok(*record.id())
    }

    async fn recent_records(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
