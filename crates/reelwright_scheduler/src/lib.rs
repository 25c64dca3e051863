//! Scheduling for Reelwright productions.
//!
//! [`Scheduler::run_batch`] runs productions back to back, respecting a
//! ceiling on successful productions per UTC day and stopping the batch when
//! a provider's quota runs out. [`Scheduler::run_periodic`] repeats batches
//! at the times a [`ScheduleType`] yields until cancelled.
//! [`TrendRefresher`] fills the content queue the scheduler draws ideas from.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod schedule;
mod scheduler;
mod trends;

pub use schedule::{Schedule, ScheduleType};
pub use scheduler::{BatchReport, Scheduler, SchedulerConfig, StopReason};
pub use trends::{RefreshReport, TrendRefresher, TrendsConfig};
