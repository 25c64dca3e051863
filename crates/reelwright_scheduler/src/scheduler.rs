//! Batch runs under a daily ceiling.

use crate::{Schedule, ScheduleType};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use reelwright_core::{
    Clock, FailureKind, ProductionRecord, ProductionRequest, SystemClock, TopicSelection,
};
use reelwright_error::{ConfigError, ReelwrightResult, StorageError, StorageErrorKind};
use reelwright_history::ContentQueue;
use reelwright_pipeline::Orchestrator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Most successful productions per UTC day.
    #[serde(default = "default_max_per_day")]
    max_per_day: usize,
    /// Productions per periodic batch.
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    /// When periodic batches run.
    #[serde(default)]
    schedule: ScheduleType,
}

fn default_max_per_day() -> usize {
    3
}

fn default_batch_size() -> usize {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_per_day: default_max_per_day(),
            batch_size: default_batch_size(),
            schedule: ScheduleType::default(),
        }
    }
}

impl SchedulerConfig {
    /// Settings from explicit values.
    pub fn new(max_per_day: usize, batch_size: usize, schedule: ScheduleType) -> Self {
        Self {
            max_per_day,
            batch_size,
            schedule,
        }
    }

    /// Check the schedule and batch size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::for_setting("scheduler.batch_size", "must be at least 1"));
        }
        self.schedule.validate()
    }
}

/// Why a batch ended before running every production.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum StopReason {
    /// Today's successes reached the ceiling.
    #[display("daily ceiling of {} reached", max)]
    DailyCeiling {
        /// Configured ceiling.
        max: usize,
    },
    /// A provider's allowance ran out.
    #[display("quota exhausted")]
    QuotaExceeded,
    /// History or checkpoints could not be written.
    #[display("storage failure: {}", _0)]
    StorageFailure(String),
    /// Cancellation was requested.
    #[display("cancelled")]
    Cancelled,
}

/// Records produced by one batch.
#[derive(Debug, Clone, Default, Getters)]
pub struct BatchReport {
    records: Vec<ProductionRecord>,
    stopped: Option<StopReason>,
}

impl BatchReport {
    /// Finalized successes in this batch.
    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }
}

/// Runs productions one after another.
///
/// Batches never overlap within a process: a second caller waits for the
/// running batch to finish. When the request leaves both category and theme
/// open and a [`ContentQueue`] is attached, each production takes the oldest
/// queued idea first.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    config: SchedulerConfig,
    request: ProductionRequest,
    queue: Option<Arc<ContentQueue>>,
    clock: Arc<dyn Clock>,
    batch: Mutex<()>,
}

impl Scheduler {
    /// Scheduler producing random topics with uploads enabled.
    pub fn new(orchestrator: Arc<Orchestrator>, config: SchedulerConfig) -> Self {
        Self {
            orchestrator,
            config,
            request: ProductionRequest::random(),
            queue: None,
            clock: Arc::new(SystemClock),
            batch: Mutex::new(()),
        }
    }

    /// Use `request` for every scheduled production.
    pub fn with_request(mut self, request: ProductionRequest) -> Self {
        self.request = request;
        self
    }

    /// Draw categories and themes from queued ideas.
    pub fn with_queue(mut self, queue: Arc<ContentQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Time source for the daily ceiling and periodic waits.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn start_of_day(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// The configured request, or the oldest usable queued idea when the
    /// request leaves category and theme open.
    async fn next_request(&self) -> ReelwrightResult<ProductionRequest> {
        let open = *self.request.topic() == TopicSelection::Random && self.request.theme().is_none();
        let Some(queue) = self.queue.as_ref().filter(|_| open) else {
            return Ok(self.request.clone());
        };

        let allowed = self.orchestrator.content().categories();
        while let Some(idea) = queue.pop_front().await? {
            if !allowed.contains(idea.topic()) {
                warn!(topic = %idea.topic(), theme = %idea.theme(), "Skipping queued idea for an unconfigured category");
                continue;
            }
            info!(topic = %idea.topic(), theme = %idea.theme(), "Producing queued idea");
            return Ok(self.request.for_idea(&idea));
        }
        Ok(self.request.clone())
    }

    /// Run up to `count` productions.
    ///
    /// Stops early when the daily ceiling is reached, when a production
    /// fails for lack of quota or storage, or on cancellation. Other failed
    /// productions are recorded and the batch continues.
    #[instrument(skip(self, cancel), fields(max_per_day = self.config.max_per_day))]
    pub async fn run_batch(
        &self,
        count: usize,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<BatchReport> {
        let _running = self.batch.lock().await;
        let mut report = BatchReport::default();

        for index in 0..count {
            if cancel.is_cancelled() {
                report.stopped = Some(StopReason::Cancelled);
                break;
            }

            let produced = match self
                .orchestrator
                .history()
                .count_successes_since(self.start_of_day())
                .await
            {
                Ok(produced) => produced,
                Err(e) => {
                    error!(error = %e, "Could not read today's productions");
                    report.stopped = Some(StopReason::StorageFailure(e.to_string()));
                    break;
                }
            };
            if produced >= self.config.max_per_day {
                info!(produced, "Daily ceiling reached");
                report.stopped = Some(StopReason::DailyCeiling {
                    max: self.config.max_per_day,
                });
                break;
            }

            let request = match self.next_request().await {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Could not read the content queue");
                    report.stopped = Some(StopReason::StorageFailure(e.to_string()));
                    break;
                }
            };

            info!(index, count, produced_today = produced, "Starting scheduled production");
            let record = match self.orchestrator.produce(&request, cancel).await {
                Ok(record) => record,
                Err(e) if e.is_usage() => return Err(e),
                Err(e) => {
                    error!(error = %e, "Production could not be recorded");
                    report.stopped = Some(StopReason::StorageFailure(e.to_string()));
                    break;
                }
            };

            let failure = record.failure_kind();
            report.records.push(record);
            match failure {
                Some(FailureKind::QuotaExceeded) => {
                    warn!("Quota exhausted, ending batch");
                    report.stopped = Some(StopReason::QuotaExceeded);
                    break;
                }
                Some(FailureKind::StorageFailure) => {
                    report.stopped = Some(StopReason::StorageFailure(
                        "production finalized with a storage failure".to_string(),
                    ));
                    break;
                }
                Some(FailureKind::Cancelled) => {
                    report.stopped = Some(StopReason::Cancelled);
                    break;
                }
                _ => {}
            }
        }

        info!(
            produced = report.records.len(),
            successes = report.successes(),
            stopped = ?report.stopped,
            "Batch finished"
        );
        Ok(report)
    }

    /// Run a batch of `count` at every time `schedule` yields until cancelled.
    ///
    /// Quota and ceiling stops end only the current batch. A storage failure
    /// ends the loop.
    #[instrument(skip(self, schedule, cancel))]
    pub async fn run_periodic(
        &self,
        schedule: &ScheduleType,
        count: usize,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<()> {
        schedule.validate()?;
        loop {
            let now = self.clock.now();
            let Some(next) = schedule.next_execution(now) else {
                warn!("Schedule has no further runs");
                return Ok(());
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Waiting for next batch");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let report = self.run_batch(count, cancel).await?;
            match report.stopped() {
                Some(StopReason::StorageFailure(message)) => {
                    error!(error = %message, "Stopping scheduler after storage failure");
                    return Err(StorageError::new(StorageErrorKind::FileWrite(message.clone())).into());
                }
                Some(StopReason::Cancelled) => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                _ => {}
            }
        }
    }
}
