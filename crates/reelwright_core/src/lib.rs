//! Core data types for the Reelwright video pipeline.
//!
//! This crate holds the vocabulary every other Reelwright crate speaks:
//!
//! - **Requests**: [`ProductionRequest`] and topic selection
//! - **Records**: [`ProductionRecord`], the durable unit of history, with its
//!   per-stage [`StageReport`]s and [`PipelineState`]
//! - **Artifacts**: handles passed from one stage to the next
//! - **Fingerprints**: content hashes used for duplicate detection
//! - **Ideas**: [`ContentIdea`] suggestions queued from platform trends
//! - **Clock**: injectable time source for period and schedule arithmetic
//!
//! # Example
//!
//! ```
//! use reelwright_core::{ProductionRecord, RecordId, TopicCategory, PipelineState};
//! use chrono::Utc;
//!
//! let record = ProductionRecord::new(
//!     RecordId::new(),
//!     None,
//!     TopicCategory::new("prophets"),
//!     "patience",
//!     Utc::now(),
//! );
//! assert_eq!(*record.state(), PipelineState::Created);
//! assert!(!record.is_final());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod clock;
mod fingerprint;
mod idea;
mod metadata;
mod outcome;
mod record;
mod request;
mod topic;

pub use artifact::{
    AudioHandle, Billed, IdempotencyToken, MediaHandle, Script, ScriptBuilder, ScriptBuilderError,
    UploadId, UploadMetadata, UploadMetadataBuilder, UploadMetadataBuilderError, VideoHandle,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::Fingerprint;
pub use idea::ContentIdea;
pub use metadata::{clean_title, fallback_title, summarize, UploadTemplate};
pub use outcome::StageOutcome;
pub use record::{
    FailureKind, FailureSummary, PipelineState, ProductionRecord, RecordId, RecordStatus,
    StageErrorDetail, StageKind, StageReport, StageStatus,
};
pub use request::{ProductionRequest, ProductionRequestBuilder, ProductionRequestBuilderError};
pub use topic::{TopicCategory, TopicSelection};
