//! When periodic batches run.

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use reelwright_error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Computes upcoming batch times.
pub trait Schedule {
    /// First run strictly after `after`, or `None` when the schedule is exhausted.
    fn next_execution(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Schedule variants. Wall-clock times are UTC.
///
/// # Examples
///
/// ```
/// use reelwright_scheduler::{Schedule, ScheduleType};
/// use chrono::{TimeZone, Utc};
///
/// let schedule = ScheduleType::Daily { at: "09:30".to_string() };
/// let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
/// let next = schedule.next_execution(now).unwrap();
/// assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleType {
    /// Every day at `at` (`HH:MM` or `HH:MM:SS`).
    Daily {
        /// Time of day.
        at: String,
    },
    /// Once a week.
    Weekly {
        /// Day of the week, e.g. `"sunday"`.
        weekday: Weekday,
        /// Time of day.
        at: String,
    },
    /// Fixed spacing between batches.
    Interval {
        /// Seconds between batches.
        seconds: u64,
    },
    /// Cron expression with a seconds field, e.g. `"0 0 9 * * Mon-Fri"`.
    Cron {
        /// Expression understood by the `cron` crate.
        expression: String,
    },
}

impl Default for ScheduleType {
    fn default() -> Self {
        Self::Daily {
            at: "09:00".to_string(),
        }
    }
}

fn parse_time(at: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(at, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(at, "%H:%M"))
        .ok()
}

impl ScheduleType {
    /// Reject times, intervals or expressions that can never fire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Daily { at } | Self::Weekly { at, .. } => {
                if parse_time(at).is_none() {
                    return Err(ConfigError::for_setting(
                        "scheduler.schedule.at",
                        format!("'{}' is not a HH:MM time", at),
                    ));
                }
            }
            Self::Interval { seconds } => {
                if *seconds == 0 {
                    return Err(ConfigError::for_setting(
                        "scheduler.schedule.seconds",
                        "must be at least 1",
                    ));
                }
            }
            Self::Cron { expression } => {
                cron::Schedule::from_str(expression).map_err(|e| {
                    ConfigError::for_setting(
                        "scheduler.schedule.expression",
                        format!("'{}': {}", expression, e),
                    )
                })?;
            }
        }
        Ok(())
    }
}

impl Schedule for ScheduleType {
    fn next_execution(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Daily { at } => {
                let time = parse_time(at)?;
                (0..=1)
                    .map(|day| (after.date_naive() + Duration::days(day)).and_time(time).and_utc())
                    .find(|candidate| *candidate > after)
            }
            Self::Weekly { weekday, at } => {
                let time = parse_time(at)?;
                (0..=7)
                    .map(|day| after.date_naive() + Duration::days(day))
                    .filter(|date| chrono::Datelike::weekday(date) == *weekday)
                    .map(|date| date.and_time(time).and_utc())
                    .find(|candidate| *candidate > after)
            }
            Self::Interval { seconds } => {
                let seconds = i64::try_from(*seconds).ok()?;
                Some(after + Duration::seconds(seconds))
            }
            Self::Cron { expression } => {
                let schedule = cron::Schedule::from_str(expression).ok()?;
                schedule.after(&after).next()
            }
        }
    }
}
