//! Quota-aware, retrying stage executor.

use crate::{Pacer, RetryPolicy, RetryRun, Stage};
use reelwright_core::StageOutcome;
use reelwright_error::{ReelwrightResult, StageError};
use reelwright_quota::QuotaTracker;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Runs stages under the shared retry, pacing and quota contract.
#[derive(Debug, Clone)]
pub struct StageExecutor {
    quota: Arc<QuotaTracker>,
    retry: RetryPolicy,
    pacer: Pacer,
}

impl StageExecutor {
    /// Create an executor.
    pub fn new(quota: Arc<QuotaTracker>, retry: RetryPolicy, pacer: Pacer) -> Self {
        Self {
            quota,
            retry,
            pacer,
        }
    }

    /// Shared quota tracker.
    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// Retry policy in force.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Execute one stage against one provider.
    ///
    /// Quota refusal and every provider failure are reported inside the
    /// returned [`StageOutcome`].
    ///
    /// # Errors
    ///
    /// Returns an error only when the quota ledger cannot be read before the
    /// call. A ledger write that fails after a successful call is reported
    /// in [`StageOutcome::ledger_failure`] alongside the output.
    #[instrument(skip(self, stage, input), fields(stage = %stage.kind()))]
    pub async fn execute<S>(
        &self,
        stage: &S,
        provider_index: usize,
        input: &S::Input,
    ) -> ReelwrightResult<StageOutcome<S::Output>>
    where
        S: Stage + ?Sized,
    {
        let Some(provider) = stage.providers().get(provider_index).cloned() else {
            return Ok(StageOutcome {
                result: Err(StageError::terminal(format!(
                    "no provider configured at position {} for {} stage",
                    provider_index,
                    stage.kind()
                ))),
                attempts: 0,
                provider: None,
                last_error: None,
                ledger_failure: None,
            });
        };

        let reservation = match stage.quota_estimate(input) {
            None => None,
            Some(estimate) => match self.quota.reserve(&provider, estimate).await {
                Ok(reservation) => Some(reservation),
                Err(e) if e.is_exceeded() => {
                    info!(provider = %provider, estimate, "Stage refused by quota before calling provider");
                    let err = StageError::quota_exceeded(e.kind.to_string());
                    return Ok(StageOutcome {
                        result: Err(err.clone()),
                        attempts: 0,
                        provider: Some(provider),
                        last_error: Some(err),
                        ledger_failure: None,
                    });
                }
                Err(e) => return Err(e.into()),
            },
        };

        let run = self
            .retry
            .run(&self.pacer, &provider, || stage.attempt(provider_index, input))
            .await;

        let mut ledger_failure = None;
        let result = match (run.result, reservation) {
            (Ok(billed), Some(reservation)) => {
                // The provider call already happened, so its output is kept.
                if let Err(e) = self.quota.commit(reservation, billed.cost).await {
                    error!(provider = %provider, cost = billed.cost, error = %e, "Could not record stage cost in quota ledger");
                    ledger_failure = Some(e.to_string());
                }
                Ok(billed.value)
            }
            (Ok(billed), None) => Ok(billed.value),
            (Err(e), Some(reservation)) => {
                self.quota.release(reservation).await;
                Err(e)
            }
            (Err(e), None) => Err(e),
        };

        match &result {
            Ok(_) => debug!(provider = %provider, attempts = run.attempts, "Stage attempt succeeded"),
            Err(e) => warn!(provider = %provider, attempts = run.attempts, error = %e.kind, "Stage failed"),
        }

        Ok(StageOutcome {
            result,
            attempts: run.attempts,
            provider: Some(provider),
            last_error: run.last_error,
            ledger_failure,
        })
    }

    /// Retry an auxiliary provider call (no quota) under the same policy.
    pub async fn retry<T, F, Fut>(&self, provider: &str, operation: F) -> RetryRun<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        self.retry.run(&self.pacer, provider, operation).await
    }
}
