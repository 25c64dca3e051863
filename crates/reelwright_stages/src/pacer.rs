//! Per-provider request pacing.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Requests-per-minute limiters keyed by provider name.
///
/// Providers without a configured rate are not paced.
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    limiters: HashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl Pacer {
    /// Pacer with no limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Pacer from provider → requests per minute. Zero rates are ignored.
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let limiters = rates
            .into_iter()
            .filter_map(|(provider, rpm)| {
                NonZeroU32::new(rpm).map(|n| {
                    let quota = Quota::per_minute(n);
                    (provider.into(), Arc::new(RateLimiter::direct(quota)))
                })
            })
            .collect();
        Self { limiters }
    }

    /// Wait until the provider may be called again.
    pub async fn until_ready(&self, provider: &str) {
        if let Some(limiter) = self.limiters.get(provider) {
            limiter.until_ready().await;
            debug!(provider, "Rate limit permit acquired");
        }
    }
}
