//! Bounded retry with exponential backoff.

use crate::Pacer;
use derive_getters::Getters;
use reelwright_error::{RetryableError, StageError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry2::strategy::jitter;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// Retry configuration shared by every stage.
///
/// Delays double from `base_delay_ms`, are capped at `max_delay_ms`, and
/// optionally get random jitter.
///
/// # Examples
///
/// ```
/// use reelwright_stages::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, 100, 10_000, false);
/// assert_eq!(
///     policy.delays(),
///     vec![Duration::from_millis(100), Duration::from_millis(200)]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per provider, including the first.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,
    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
    /// Randomize delays.
    #[serde(default = "default_jitter")]
    jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct RetryRun<T> {
    /// Final result.
    pub result: Result<T, StageError>,
    /// Attempts made.
    pub attempts: u32,
    /// Last error seen, including ones followed by a successful attempt.
    pub last_error: Option<StageError>,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is raised to at least 1.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
            jitter,
        }
    }

    /// Delays between attempts; one fewer than `max_attempts`.
    pub fn delays(&self) -> Vec<Duration> {
        let cap = Duration::from_millis(self.max_delay_ms);
        (0..self.max_attempts.saturating_sub(1))
            .map(|n| {
                let factor = 1u64.checked_shl(n).unwrap_or(u64::MAX);
                let delay = Duration::from_millis(self.base_delay_ms.saturating_mul(factor)).min(cap);
                if self.jitter { jitter(delay) } else { delay }
            })
            .collect()
    }

    /// Run `operation` until it succeeds, fails terminally, or runs out of attempts.
    ///
    /// The pacer is awaited before every attempt.
    pub async fn run<T, F, Fut>(&self, pacer: &Pacer, provider: &str, operation: F) -> RetryRun<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let attempts = AtomicU32::new(0);
        let last_error: Mutex<Option<StageError>> = Mutex::new(None);

        let result = Retry::spawn(self.delays(), || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            pacer.until_ready(provider).await;

            match operation().await {
                Ok(value) => Ok(value),
                Err(e) => {
                    *last_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.clone());
                    if e.is_retryable() {
                        warn!(provider, attempt, error = %e.kind, "Transient error, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    } else {
                        warn!(provider, attempt, error = %e.kind, "Permanent error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        RetryRun {
            result,
            attempts: attempts.load(Ordering::SeqCst),
            last_error: last_error.into_inner().unwrap_or_else(|p| p.into_inner()),
        }
    }
}
