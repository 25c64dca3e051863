//! Transient per-stage results.

use crate::{StageReport, StageStatus, StageErrorDetail};
use reelwright_error::StageError;

/// Result of running one stage, possibly across a fallback provider.
///
/// Carries the output on success and the last error either way, so the
/// orchestrator can snapshot it into the record as a [`StageReport`].
#[derive(Debug)]
pub struct StageOutcome<T> {
    /// Output on success, error otherwise.
    pub result: Result<T, StageError>,
    /// Attempts made, summed across providers.
    pub attempts: u32,
    /// Provider that produced the result or the final error.
    pub provider: Option<String>,
    /// Last error seen, even when a later attempt succeeded.
    pub last_error: Option<StageError>,
    /// Set when the provider succeeded but its cost could not be written
    /// to the quota ledger. The output is still in `result`.
    pub ledger_failure: Option<String>,
}

impl<T> StageOutcome<T> {
    /// Status this outcome maps to.
    pub fn status(&self) -> StageStatus {
        if self.result.is_ok() {
            StageStatus::Success
        } else {
            StageStatus::Failed
        }
    }

    /// Snapshot into a record report.
    pub fn report(&self) -> StageReport {
        let error = self.last_error.as_ref().map(StageErrorDetail::from);
        match &self.result {
            Ok(_) => StageReport::success(self.attempts, self.provider.clone()).with_error(error),
            Err(e) => StageReport::failed(
                self.attempts,
                self.provider.clone(),
                StageErrorDetail::from(e),
            ),
        }
    }
}
