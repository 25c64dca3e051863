//! Capability traits for external collaborators.
//!
//! One trait per stage; concrete providers are selected by configuration
//! and held as trait objects.

use crate::SafetyMode;
use async_trait::async_trait;
use reelwright_core::{
    AudioHandle, Billed, ContentIdea, IdempotencyToken, MediaHandle, Script, TopicCategory,
    UploadId, UploadMetadata, VideoHandle,
};
use reelwright_error::StageError;
use std::path::Path;

/// Writes narration scripts.
#[async_trait]
pub trait ScriptGenerator: Send + Sync + std::fmt::Debug {
    /// Provider name, also the quota ledger key.
    fn name(&self) -> &str;

    /// Generate a script; the cost is the provider-reported usage.
    async fn generate_script(
        &self,
        category: &TopicCategory,
        theme: &str,
    ) -> Result<Billed<Script>, StageError>;
}

/// Turns text into narration audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + std::fmt::Debug {
    /// Provider name, also the quota ledger key.
    fn name(&self) -> &str;

    /// Synthesize `text` into `output`; the cost is billed characters.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<Billed<AudioHandle>, StageError>;
}

/// Finds and downloads stock footage.
#[async_trait]
pub trait FootageSource: Send + Sync + std::fmt::Debug {
    /// Provider name, also the quota ledger key.
    fn name(&self) -> &str;

    /// Clips matching any of the queries, at least `min_duration` seconds long
    /// where possible. An empty result is not an error.
    async fn find_footage(
        &self,
        queries: &[String],
        mode: SafetyMode,
        min_duration: f64,
    ) -> Result<Vec<MediaHandle>, StageError>;
}

/// Renders the final video.
#[async_trait]
pub trait VideoComposer: Send + Sync + std::fmt::Debug {
    /// Provider name.
    fn name(&self) -> &str;

    /// Compose narration and clips into `output`.
    async fn compose(
        &self,
        audio: &AudioHandle,
        media: &[MediaHandle],
        script: &Script,
        output: &Path,
    ) -> Result<VideoHandle, StageError>;
}

/// Publishes videos.
///
/// Implementations hold a pre-authorized client; an authorization failure
/// is reported as a terminal error.
#[async_trait]
pub trait Uploader: Send + Sync + std::fmt::Debug {
    /// Provider name, also the quota ledger key.
    fn name(&self) -> &str;

    /// Publish a video tagged with the idempotency token.
    async fn upload(
        &self,
        video: &VideoHandle,
        metadata: &UploadMetadata,
        token: &IdempotencyToken,
    ) -> Result<UploadId, StageError>;

    /// Find a video previously published with this token.
    async fn find_by_token(&self, token: &IdempotencyToken) -> Result<Option<UploadId>, StageError>;
}

/// Reports what is currently popular on a video platform.
#[async_trait]
pub trait TrendSource: Send + Sync + std::fmt::Debug {
    /// Provider name.
    fn name(&self) -> &str;

    /// Titles of popular recent videos matching any of the queries.
    async fn trending_titles(&self, queries: &[String]) -> Result<Vec<String>, StageError>;
}

/// Turns trending titles into content ideas.
#[async_trait]
pub trait IdeaGenerator: Send + Sync + std::fmt::Debug {
    /// Provider name.
    fn name(&self) -> &str;

    /// Up to `count` ideas inspired by `trends`, each in one of `categories`.
    /// The cost is the provider-reported usage.
    async fn generate_ideas(
        &self,
        trends: &[String],
        categories: &[TopicCategory],
        count: usize,
    ) -> Result<Billed<Vec<ContentIdea>>, StageError>;
}
