//! Process exit codes.

use reelwright_core::{FailureKind, ProductionRecord};
use reelwright_error::ReelwrightError;
use reelwright_scheduler::{BatchReport, StopReason};

/// How a command ended, as seen by the calling shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ExitStatus {
    /// Everything requested was done.
    #[display("success")]
    Success,
    /// A stage failed, a duplicate was refused, the run was cancelled or
    /// storage failed.
    #[display("failed")]
    Failed,
    /// A provider budget was exhausted.
    #[display("quota exceeded")]
    QuotaExceeded,
    /// Bad configuration or arguments.
    #[display("usage error")]
    Usage,
}

impl ExitStatus {
    /// Numeric code passed to the operating system.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::QuotaExceeded => 2,
            Self::Usage => 3,
        }
    }

    /// Status for one finalized production.
    pub fn for_record(record: &ProductionRecord) -> Self {
        if record.is_success() {
            return Self::Success;
        }
        match record.failure_kind() {
            Some(FailureKind::QuotaExceeded) => Self::QuotaExceeded,
            _ => Self::Failed,
        }
    }

    /// Status for an error that prevented a record from being produced.
    pub fn for_error(error: &ReelwrightError) -> Self {
        if error.is_usage() {
            Self::Usage
        } else if error.is_quota_exceeded() {
            Self::QuotaExceeded
        } else {
            Self::Failed
        }
    }

    /// Status for a batch: quota exhaustion wins, then any failed
    /// production or storage stop. Reaching the daily ceiling is success.
    pub fn for_batch(report: &BatchReport) -> Self {
        match report.stopped() {
            Some(StopReason::QuotaExceeded) => return Self::QuotaExceeded,
            Some(StopReason::StorageFailure(_)) | Some(StopReason::Cancelled) => {
                return Self::Failed;
            }
            Some(StopReason::DailyCeiling { .. }) | None => {}
        }
        report
            .records()
            .iter()
            .map(Self::for_record)
            .max()
            .unwrap_or(Self::Success)
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}
