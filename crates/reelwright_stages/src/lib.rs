//! Stage executors for the Reelwright pipeline.
//!
//! Every pipeline step (script, audio, footage, compose, upload) is a
//! [`Stage`] wrapping one or more provider collaborators. The
//! [`StageExecutor`] gives all of them the same contract:
//!
//! 1. Reserve the estimated cost with the quota tracker (quota-bound stages only);
//!    refusal means no external call is made
//! 2. Pace the call through a per-provider rate limiter
//! 3. Retry transient failures with exponential backoff
//! 4. Stop immediately on terminal or quota failures
//! 5. Commit the billed cost on success, release the reservation otherwise
//!
//! Collaborators report failures only as [`reelwright_error::StageError`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod collaborators;
mod executor;
mod pacer;
mod retry;
mod safety;
mod stage;
mod stages;
#[cfg(feature = "testing")]
pub mod testing;

pub use collaborators::{
    FootageSource, IdeaGenerator, ScriptGenerator, SpeechSynthesizer, TrendSource, Uploader,
    VideoComposer,
};
pub use executor::StageExecutor;
pub use pacer::Pacer;
pub use retry::{RetryPolicy, RetryRun};
pub use safety::{
    KeywordSafetyPolicy, KeywordSafetyPolicyBuilder, KeywordSafetyPolicyBuilderError, SafetyMode,
    SafetyPolicy,
};
pub use stage::Stage;
pub use stages::{
    AudioInput, AudioStage, ComposeInput, ComposeStage, FootageInput, FootageStage, ScriptInput,
    ScriptStage, UploadInput, UploadStage,
};
