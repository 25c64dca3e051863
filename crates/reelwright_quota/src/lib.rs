//! Provider quota tracking.
//!
//! Budgets are tracked per provider and per period (daily or monthly)
//! through a two-phase protocol:
//!
//! 1. [`QuotaTracker::reserve`] an estimated amount before the external call;
//!    an over-budget reservation is rejected without any call being made
//! 2. [`QuotaTracker::commit`] the billed amount on success, or
//!    [`QuotaTracker::release`] on failure
//!
//! Period rollover is lazy: it happens when the ledger is next touched.
//!
//! # Example
//!
//! ```
//! use reelwright_core::SystemClock;
//! use reelwright_quota::{Period, QuotaLimit, QuotaTracker};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut limits = BTreeMap::new();
//! limits.insert("youtube".to_string(), QuotaLimit::new(Period::Daily, 6));
//! let tracker = QuotaTracker::in_memory(limits, Arc::new(SystemClock));
//!
//! let reservation = tracker.reserve("youtube", 1).await?;
//! tracker.commit(reservation, 1).await?;
//! assert_eq!(tracker.remaining("youtube").await, Some(5));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ledger;
mod tracker;

pub use ledger::{LedgerEntry, Period, QuotaLedger, QuotaLimit};
pub use tracker::{QuotaTracker, Reservation};
