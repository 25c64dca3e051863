//! Reelwright - automated short story videos
//!
//! Reelwright turns a topic into a narrated vertical video and publishes it:
//! a script is generated, narrated, laid over stock footage, rendered with
//! `ffmpeg` and uploaded. Every run leaves exactly one record in an
//! append-only history, provider budgets are tracked across runs, and an
//! interrupted run can be resumed from its last completed stage.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use reelwright::{ProductionRequest, Reelwright, ReelwrightConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReelwrightConfig::load(None)?;
//!     let app = Reelwright::open(config).await?;
//!     let record = app
//!         .produce(&ProductionRequest::random(), &CancellationToken::new())
//!         .await?;
//!     println!("{} finished as {}", record.id(), record.status());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `reelwright_error` - error types
//! - `reelwright_core` - requests, records, artifacts, clock
//! - `reelwright_history` - history store, duplicate policy, checkpoints
//! - `reelwright_quota` - provider budgets
//! - `reelwright_stages` - stage executors and collaborator traits
//! - `reelwright_providers` - HTTP and `ffmpeg` adapters
//! - `reelwright_pipeline` - the production state machine
//! - `reelwright_scheduler` - batches, daily ceiling, periodic runs
//!
//! This crate re-exports the common types and adds configuration, logging
//! and wiring.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod app;
mod config;
mod exit;
mod logging;

pub use crate::app::{QuotaRow, Reelwright};
pub use crate::config::{
    DEFAULT_CONFIG, HistoryConfig, LoggingConfig, QuotaStoreConfig, ReelwrightConfig,
};
pub use crate::exit::ExitStatus;
pub use crate::logging::init_logging;

pub use reelwright_core::*;
pub use reelwright_error::*;
pub use reelwright_history::{
    ArtifactSet, Checkpoint, CheckpointStore, ContentQueue, DuplicatePolicy, HistoryStore,
    InMemoryHistoryStore, JsonlHistoryStore, ThemeSimilarityPolicy,
};
pub use reelwright_pipeline::{ContentConfig, Orchestrator, PipelineConfig, StageSet};
pub use reelwright_providers::{ProviderSet, ProvidersConfig};
pub use reelwright_quota::{Period, QuotaLimit, QuotaTracker};
pub use reelwright_scheduler::{
    BatchReport, RefreshReport, ScheduleType, Scheduler, SchedulerConfig, StopReason,
    TrendRefresher, TrendsConfig,
};
pub use reelwright_stages::{KeywordSafetyPolicy, RetryPolicy, SafetyMode};
