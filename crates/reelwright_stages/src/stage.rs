//! Uniform stage contract.

use async_trait::async_trait;
use reelwright_core::{Billed, StageKind};
use reelwright_error::StageError;

/// One pipeline step backed by an ordered list of providers.
///
/// Index 0 is the primary provider; later indices are fallbacks the
/// orchestrator may try once each.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Data the stage consumes.
    type Input: Send + Sync;
    /// Data the stage produces.
    type Output: Send;

    /// Which step this is.
    fn kind(&self) -> StageKind;

    /// Provider names in fallback order.
    fn providers(&self) -> Vec<String>;

    /// Estimated quota cost for the input, or `None` when the stage is not quota-bound.
    fn quota_estimate(&self, input: &Self::Input) -> Option<u64>;

    /// One attempt against one provider.
    async fn attempt(
        &self,
        provider_index: usize,
        input: &Self::Input,
    ) -> Result<Billed<Self::Output>, StageError>;
}
