//! Two-phase quota tracker.

use crate::{LedgerEntry, QuotaLedger, QuotaLimit};
use reelwright_core::Clock;
use reelwright_error::{QuotaError, QuotaErrorKind, ReelwrightResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Budget held for an in-flight external call.
///
/// Must be passed back to [`QuotaTracker::commit`] or
/// [`QuotaTracker::release`]; dropping it keeps the amount held until the
/// process exits.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    id: u64,
    provider: String,
    amount: u64,
    metered: bool,
}

impl Reservation {
    /// Provider the reservation is held against.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Estimated amount held.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// False when the provider has no configured limit.
    pub fn is_metered(&self) -> bool {
        self.metered
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    ledger: QuotaLedger,
    pending: HashMap<u64, (String, u64)>,
    next_id: u64,
}

impl TrackerState {
    fn pending_for(&self, provider: &str) -> u64 {
        self.pending
            .values()
            .filter(|(p, _)| p == provider)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

/// In-process, authoritative quota tracker.
///
/// All mutations go through one mutex, so reservations against the same
/// ledger entry are strictly ordered. Providers without a configured limit
/// are unmetered: their reservations always succeed and nothing is recorded.
#[derive(Debug)]
pub struct QuotaTracker {
    state: Mutex<TrackerState>,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Tracker that keeps the ledger in memory only.
    pub fn in_memory(limits: BTreeMap<String, QuotaLimit>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut ledger = QuotaLedger::default();
        for (provider, limit) in limits {
            ledger
                .entries_mut()
                .insert(provider, LedgerEntry::new(limit, now));
        }
        Self {
            state: Mutex::new(TrackerState {
                ledger,
                ..TrackerState::default()
            }),
            path: None,
            clock,
        }
    }

    /// Tracker persisted to a JSON ledger file.
    ///
    /// Stored consumption is kept; configured limits replace stored ones,
    /// and providers no longer configured are dropped.
    #[instrument(skip(path, limits, clock), fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<Path>,
        limits: BTreeMap<String, QuotaLimit>,
        clock: Arc<dyn Clock>,
    ) -> ReelwrightResult<Self> {
        let path = path.as_ref().to_path_buf();
        let now = clock.now();

        let mut stored = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice::<QuotaLedger>(&data).map_err(|e| {
                QuotaError::new(QuotaErrorKind::Persistence(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QuotaLedger::default(),
            Err(e) => {
                return Err(QuotaError::new(QuotaErrorKind::Persistence(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };

        let mut ledger = QuotaLedger::default();
        for (provider, limit) in limits {
            let entry = match stored.entries_mut().remove(&provider) {
                Some(mut entry) => {
                    entry.reconfigure(limit, now);
                    entry
                }
                None => LedgerEntry::new(limit, now),
            };
            ledger.entries_mut().insert(provider, entry);
        }
        info!(providers = ledger.iter().count(), "Loaded quota ledger");

        Ok(Self {
            state: Mutex::new(TrackerState {
                ledger,
                ..TrackerState::default()
            }),
            path: Some(path),
            clock,
        })
    }

    /// Hold `amount` units against a provider's budget.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaErrorKind::Exceeded`] when committed plus outstanding
    /// plus requested units would exceed the limit.
    #[instrument(skip(self))]
    pub async fn reserve(&self, provider: &str, amount: u64) -> Result<Reservation, QuotaError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let pending = state.pending_for(provider);

        let metered = match state.ledger.entry_mut(provider) {
            None => false,
            Some(entry) => {
                if entry.roll_over(now) {
                    info!(provider, period_start = %entry.period_start(), "Quota period rolled over");
                }
                let committed = entry.consumed().saturating_add(pending);
                if committed.saturating_add(amount) > *entry.limit() {
                    let remaining = entry.limit().saturating_sub(committed);
                    warn!(provider, requested = amount, remaining, "Quota reservation refused");
                    return Err(QuotaError::new(QuotaErrorKind::Exceeded {
                        provider: provider.to_string(),
                        requested: amount,
                        remaining,
                    }));
                }
                true
            }
        };

        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id, (provider.to_string(), amount));
        debug!(reservation = id, metered, "Quota reserved");

        Ok(Reservation {
            id,
            provider: provider.to_string(),
            amount,
            metered,
        })
    }

    /// Record the billed amount for a successful call.
    ///
    /// An actual amount above the remaining budget is clamped at the limit
    /// so `consumed <= limit` always holds.
    #[instrument(skip(self, reservation), fields(provider = %reservation.provider, estimated = reservation.amount))]
    pub async fn commit(&self, reservation: Reservation, actual: u64) -> ReelwrightResult<()> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if state.pending.remove(&reservation.id).is_none() {
            return Err(QuotaError::new(QuotaErrorKind::UnknownReservation(reservation.id)).into());
        }
        if !reservation.metered {
            return Ok(());
        }

        if let Some(entry) = state.ledger.entry_mut(&reservation.provider) {
            entry.roll_over(now);
            let excess = entry.consume(actual);
            if excess > 0 {
                warn!(
                    actual,
                    excess,
                    limit = *entry.limit(),
                    "Billed amount exceeded remaining quota, clamped at limit"
                );
            }
            debug!(consumed = *entry.consumed(), limit = *entry.limit(), "Quota committed");
        }

        if let Some(path) = &self.path {
            Self::persist(path, &state.ledger).await?;
        }
        Ok(())
    }

    /// Return a reservation without recording consumption.
    #[instrument(skip(self, reservation), fields(provider = %reservation.provider, amount = reservation.amount))]
    pub async fn release(&self, reservation: Reservation) {
        let mut state = self.state.lock().await;
        if state.pending.remove(&reservation.id).is_none() {
            warn!(reservation = reservation.id, "Released unknown reservation");
        }
    }

    /// Units left for a provider this period, or `None` when unmetered.
    ///
    /// Outstanding reservations count as spent.
    pub async fn remaining(&self, provider: &str) -> Option<u64> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let pending = state.pending_for(provider);
        state.ledger.entry_mut(provider).map(|entry| {
            entry.roll_over(now);
            entry.remaining().saturating_sub(pending)
        })
    }

    /// Current ledger with rollover applied.
    pub async fn snapshot(&self) -> QuotaLedger {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        for entry in state.ledger.entries_mut().values_mut() {
            entry.roll_over(now);
        }
        state.ledger.clone()
    }

    async fn persist(path: &Path, ledger: &QuotaLedger) -> ReelwrightResult<()> {
        let persistence = |e: String| QuotaError::new(QuotaErrorKind::Persistence(e));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence(format!("{}: {}", parent.display(), e)))?;
        }
        let data = serde_json::to_vec_pretty(ledger).map_err(|e| persistence(e.to_string()))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, data)
            .await
            .map_err(|e| persistence(format!("{}: {}", temp_path.display(), e)))?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            persistence(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}
