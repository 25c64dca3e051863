//! Ledger data model and period arithmetic.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accounting period of a budget, aligned to UTC calendar boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Period {
    /// Resets at UTC midnight.
    Daily,
    /// Resets on the first day of the UTC month.
    Monthly,
}

impl Period {
    /// Start of the period containing `at`.
    pub fn start_of(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let date = match self {
            Period::Daily => date,
            Period::Monthly => date.with_day(1).unwrap_or(date),
        };
        date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Start of the period following the one that began at `start`.
    pub fn next_start(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::Daily => start + Duration::days(1),
            Period::Monthly => start
                .checked_add_months(Months::new(1))
                .unwrap_or(start + Duration::days(31)),
        }
    }
}

/// Configured budget for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct QuotaLimit {
    /// Accounting period.
    period: Period,
    /// Units allowed per period.
    limit: u64,
}

impl QuotaLimit {
    /// Create a limit.
    pub fn new(period: Period, limit: u64) -> Self {
        Self { period, limit }
    }
}

/// Consumption of one provider in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Accounting period.
    period: Period,
    /// Units committed this period.
    consumed: u64,
    /// Units allowed per period.
    limit: u64,
    /// Start of the current period.
    period_start: DateTime<Utc>,
}

impl LedgerEntry {
    /// Fresh entry for a period starting at the period containing `now`.
    pub fn new(limit: QuotaLimit, now: DateTime<Utc>) -> Self {
        Self {
            period: limit.period,
            consumed: 0,
            limit: limit.limit,
            period_start: limit.period.start_of(now),
        }
    }

    /// Units left this period.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    /// Reset consumption if `now` is past the current period. Returns true on rollover.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        if now >= self.period.next_start(self.period_start) {
            self.consumed = 0;
            self.period_start = self.period.start_of(now);
            true
        } else {
            false
        }
    }

    /// Apply a configured limit, resetting the entry if the period changed.
    pub(crate) fn reconfigure(&mut self, limit: QuotaLimit, now: DateTime<Utc>) {
        if self.period != limit.period {
            *self = Self::new(limit, now);
        } else {
            self.limit = limit.limit;
        }
    }

    /// Add committed units, clamping at the limit. Returns the clamped excess.
    pub(crate) fn consume(&mut self, amount: u64) -> u64 {
        let total = self.consumed.saturating_add(amount);
        self.consumed = total.min(self.limit);
        total - self.consumed
    }
}

/// Per-provider ledger entries, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl QuotaLedger {
    /// Entry for a provider.
    pub fn entry(&self, provider: &str) -> Option<&LedgerEntry> {
        self.entries.get(provider)
    }

    pub(crate) fn entry_mut(&mut self, provider: &str) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(provider)
    }

    /// All entries by provider name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LedgerEntry)> {
        self.entries.iter()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut BTreeMap<String, LedgerEntry> {
        &mut self.entries
    }
}
