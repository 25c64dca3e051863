//! Production state machine for Reelwright.
//!
//! The [`Orchestrator`] runs one production at a time through
//!
//! ```text
//! Created → ScriptReady → AudioReady → FootageReady → Composed → Uploaded | SkippedUpload
//! ```
//!
//! and finalizes it as success or failure. Any stage may escape to a failed
//! record; the failing stage is marked `failed` and everything after it
//! `skipped`. Duplicate topics get one theme reselection before the
//! production is refused as a conflict.
//!
//! Uploads are at most once per production: an idempotency token is
//! checkpointed before the upload call, and a production resumed with a
//! token but no upload id asks the platform before uploading again.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod orchestrator;

pub use config::{ContentConfig, PipelineConfig};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorBuilderError, StageSet};
