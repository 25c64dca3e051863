//! History store trait.

use crate::DuplicatePolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelwright_core::{Fingerprint, ProductionRecord, RecordId, TopicCategory};
use reelwright_error::ReelwrightResult;

/// Durable, append-only log of finalized productions.
///
/// Implementations must make `append` durable before returning and must
/// serialize concurrent appends.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a finalized record.
    ///
    /// # Errors
    ///
    /// Returns an input error for records that are still in progress, and a
    /// storage error when the write does not reach stable storage.
    async fn append(&self, record: &ProductionRecord) -> ReelwrightResult<RecordId>;

    /// Up to `limit` records, most recent first.
    ///
    /// Every call re-reads the store, so the sequence can be restarted.
    async fn recent_records(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>>;

    /// Look up a record by id.
    async fn get(&self, id: &RecordId) -> ReelwrightResult<Option<ProductionRecord>> {
        Ok(self
            .recent_records(usize::MAX)
            .await?
            .into_iter()
            .find(|r| r.id() == id))
    }

    /// Most recent successful record within `lookback` that the policy
    /// considers the same story angle as `category`/`theme`.
    async fn find_duplicate_topic(
        &self,
        category: &TopicCategory,
        theme: &str,
        lookback: usize,
        policy: &dyn DuplicatePolicy,
    ) -> ReelwrightResult<Option<ProductionRecord>> {
        Ok(self
            .recent_records(lookback)
            .await?
            .into_iter()
            .find(|r| r.is_success() && policy.is_duplicate(category, theme, r)))
    }

    /// Most recent successful record within `lookback` whose script has
    /// this fingerprint.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        lookback: usize,
    ) -> ReelwrightResult<Option<ProductionRecord>> {
        Ok(self
            .recent_records(lookback)
            .await?
            .into_iter()
            .find(|r| r.is_success() && r.script_fingerprint().as_ref() == Some(fingerprint)))
    }

    /// Number of successful records completed at or after `since`.
    async fn count_successes_since(&self, since: DateTime<Utc>) -> ReelwrightResult<usize> {
        Ok(self
            .recent_records(usize::MAX)
            .await?
            .iter()
            .filter(|r| r.is_success() && r.completed_at().as_ref().is_some_and(|at| *at >= since))
            .count())
    }
}
