//! The five pipeline stages.

use crate::{
    FootageSource, SafetyMode, SafetyPolicy, ScriptGenerator, SpeechSynthesizer, Stage, Uploader,
    VideoComposer,
};
use async_trait::async_trait;
use reelwright_core::{
    AudioHandle, Billed, IdempotencyToken, MediaHandle, RecordId, Script, ScriptBuilder,
    StageKind, TopicCategory, UploadId, UploadTemplate, VideoHandle, clean_title, fallback_title,
};
use reelwright_error::StageError;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

fn provider_at<T: ?Sized>(providers: &[Arc<T>], index: usize) -> Result<&Arc<T>, StageError> {
    providers
        .get(index)
        .ok_or_else(|| StageError::terminal(format!("no provider at position {}", index)))
}

/// Input to the script stage.
#[derive(Debug, Clone)]
pub struct ScriptInput {
    /// Category to write for.
    pub category: TopicCategory,
    /// Theme to write about.
    pub theme: String,
}

/// Generates the narration script.
#[derive(Debug, Clone)]
pub struct ScriptStage {
    generators: Vec<Arc<dyn ScriptGenerator>>,
    target_words: u32,
}

impl ScriptStage {
    /// Words per second of narration used to size scripts.
    pub const WORDS_PER_SECOND: f64 = 2.2;

    /// Stage for scripts long enough to narrate `length_seconds`.
    pub fn new(generators: Vec<Arc<dyn ScriptGenerator>>, length_seconds: u32) -> Self {
        let target_words = (f64::from(length_seconds) * Self::WORDS_PER_SECOND).round() as u32;
        Self {
            generators,
            target_words,
        }
    }

    /// Target script length in words.
    pub fn target_words(&self) -> u32 {
        self.target_words
    }
}

#[async_trait]
impl Stage for ScriptStage {
    type Input = ScriptInput;
    type Output = Script;

    fn kind(&self) -> StageKind {
        StageKind::Script
    }

    fn providers(&self) -> Vec<String> {
        self.generators.iter().map(|g| g.name().to_string()).collect()
    }

    fn quota_estimate(&self, _input: &ScriptInput) -> Option<u64> {
        // Rough token count for prompt plus completion.
        Some(u64::from(self.target_words) * 2)
    }

    async fn attempt(
        &self,
        provider_index: usize,
        input: &ScriptInput,
    ) -> Result<Billed<Script>, StageError> {
        let generator = provider_at(&self.generators, provider_index)?;
        let billed = generator
            .generate_script(&input.category, &input.theme)
            .await?;

        let script = billed.value;
        if script.text().trim().is_empty() {
            return Err(StageError::terminal(format!(
                "{} returned an empty story",
                generator.name()
            )));
        }
        let mut title = clean_title(script.title());
        if title.is_empty() {
            title = fallback_title(&input.category);
        }

        let cleaned = ScriptBuilder::default()
            .title(title)
            .text(script.text().clone())
            .visual_keywords(script.visual_keywords().clone())
            .category(input.category.clone())
            .theme(input.theme.clone())
            .build()
            .map_err(|e| StageError::terminal(e.to_string()))?;

        info!(
            provider = generator.name(),
            words = cleaned.word_count(),
            target = self.target_words,
            "Script generated"
        );
        Ok(Billed::new(cleaned, billed.cost))
    }
}

/// Input to the audio stage.
#[derive(Debug, Clone)]
pub struct AudioInput {
    /// Production the narration belongs to.
    pub record_id: RecordId,
    /// Text to narrate.
    pub text: String,
}

/// Synthesizes narration.
#[derive(Debug, Clone)]
pub struct AudioStage {
    synthesizers: Vec<Arc<dyn SpeechSynthesizer>>,
    work_dir: PathBuf,
}

impl AudioStage {
    /// Stage writing narration under `work_dir/<record id>/`.
    pub fn new(synthesizers: Vec<Arc<dyn SpeechSynthesizer>>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizers,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl Stage for AudioStage {
    type Input = AudioInput;
    type Output = AudioHandle;

    fn kind(&self) -> StageKind {
        StageKind::Audio
    }

    fn providers(&self) -> Vec<String> {
        self.synthesizers.iter().map(|s| s.name().to_string()).collect()
    }

    fn quota_estimate(&self, input: &AudioInput) -> Option<u64> {
        Some(input.text.chars().count() as u64)
    }

    async fn attempt(
        &self,
        provider_index: usize,
        input: &AudioInput,
    ) -> Result<Billed<AudioHandle>, StageError> {
        let synthesizer = provider_at(&self.synthesizers, provider_index)?;
        let dir = self.work_dir.join(input.record_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", dir.display(), e)))?;
        let output = dir.join(format!("narration-{}.mp3", synthesizer.name()));
        synthesizer.synthesize(&input.text, &output).await
    }
}

/// Input to the footage stage.
#[derive(Debug, Clone)]
pub struct FootageInput {
    /// Category of the script.
    pub category: TopicCategory,
    /// Visual keywords from the script.
    pub keywords: Vec<String>,
}

/// Finds stock footage through a safety policy.
#[derive(Debug, Clone)]
pub struct FootageStage {
    sources: Vec<Arc<dyn FootageSource>>,
    policy: Arc<dyn SafetyPolicy>,
    mode: SafetyMode,
    min_duration: f64,
    max_clips: usize,
}

impl FootageStage {
    /// Create a footage stage.
    pub fn new(
        sources: Vec<Arc<dyn FootageSource>>,
        policy: Arc<dyn SafetyPolicy>,
        mode: SafetyMode,
        min_duration: f64,
        max_clips: usize,
    ) -> Self {
        Self {
            sources,
            policy,
            mode,
            min_duration,
            max_clips: max_clips.max(1),
        }
    }
}

#[async_trait]
impl Stage for FootageStage {
    type Input = FootageInput;
    type Output = Vec<MediaHandle>;

    fn kind(&self) -> StageKind {
        StageKind::Footage
    }

    fn providers(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    fn quota_estimate(&self, _input: &FootageInput) -> Option<u64> {
        Some(1)
    }

    async fn attempt(
        &self,
        provider_index: usize,
        input: &FootageInput,
    ) -> Result<Billed<Vec<MediaHandle>>, StageError> {
        let source = provider_at(&self.sources, provider_index)?;
        let queries = self
            .policy
            .queries(&input.category, &input.keywords, self.mode);
        debug!(queries = ?queries, "Searching footage");

        let mut media = if queries.is_empty() {
            Vec::new()
        } else {
            source
                .find_footage(&queries, self.mode, self.min_duration)
                .await?
        };

        if media.is_empty() {
            let fallback = self.policy.fallback_queries(self.mode);
            info!(provider = source.name(), "No footage matched, trying fallback queries");
            if !fallback.is_empty() {
                media = source
                    .find_footage(&fallback, self.mode, self.min_duration)
                    .await?;
            }
        }

        if media.is_empty() {
            return Err(StageError::terminal(format!(
                "{} found no usable footage",
                source.name()
            )));
        }
        media.truncate(self.max_clips);
        Ok(Billed::new(media, 1))
    }
}

/// Input to the compose stage.
#[derive(Debug, Clone)]
pub struct ComposeInput {
    /// Production the video belongs to.
    pub record_id: RecordId,
    /// Script, for subtitles.
    pub script: Script,
    /// Narration.
    pub audio: AudioHandle,
    /// Clips.
    pub media: Vec<MediaHandle>,
}

/// Renders the final video.
#[derive(Debug, Clone)]
pub struct ComposeStage {
    composers: Vec<Arc<dyn VideoComposer>>,
    output_dir: PathBuf,
}

impl ComposeStage {
    /// Stage rendering into `output_dir/<record id>.mp4`.
    pub fn new(composers: Vec<Arc<dyn VideoComposer>>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            composers,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Stage for ComposeStage {
    type Input = ComposeInput;
    type Output = VideoHandle;

    fn kind(&self) -> StageKind {
        StageKind::Compose
    }

    fn providers(&self) -> Vec<String> {
        self.composers.iter().map(|c| c.name().to_string()).collect()
    }

    fn quota_estimate(&self, _input: &ComposeInput) -> Option<u64> {
        None
    }

    async fn attempt(
        &self,
        provider_index: usize,
        input: &ComposeInput,
    ) -> Result<Billed<VideoHandle>, StageError> {
        let composer = provider_at(&self.composers, provider_index)?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", self.output_dir.display(), e)))?;
        let output = self.output_dir.join(format!("{}.mp4", input.record_id));
        let video = composer
            .compose(&input.audio, &input.media, &input.script, &output)
            .await?;
        Ok(Billed::new(video, 0))
    }
}

/// Input to the upload stage.
#[derive(Debug, Clone)]
pub struct UploadInput {
    /// Rendered video.
    pub video: VideoHandle,
    /// Script, for metadata.
    pub script: Script,
    /// Token identifying this production at the platform.
    pub token: IdempotencyToken,
}

/// Publishes the video.
///
/// Within one stage run a token is sent to a platform at most once without
/// first asking that platform whether the earlier request landed.
#[derive(Debug, Clone)]
pub struct UploadStage {
    uploaders: Vec<Arc<dyn Uploader>>,
    template: UploadTemplate,
    units_per_upload: u64,
    sent: Arc<Mutex<HashSet<(usize, IdempotencyToken)>>>,
}

impl UploadStage {
    /// Create an upload stage charging `units_per_upload` quota units per video.
    pub fn new(
        uploaders: Vec<Arc<dyn Uploader>>,
        template: UploadTemplate,
        units_per_upload: u64,
    ) -> Self {
        Self {
            uploaders,
            template,
            units_per_upload,
            sent: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Record that `token` is about to be sent; false if it was sent before.
    fn first_send(&self, provider_index: usize, token: &IdempotencyToken) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert((provider_index, token.clone()))
    }

    /// Drop every send recorded for `token`.
    ///
    /// Called once the stage has settled for the production, so the set
    /// only ever holds tokens of uploads still in progress.
    pub fn forget(&self, token: &IdempotencyToken) {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|(_, sent)| sent != token);
    }

    /// Tokens sent by uploads that have not settled yet.
    pub fn unsettled(&self) -> usize {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Ask one provider whether a video with this token already exists.
    pub async fn find_by_token(
        &self,
        provider_index: usize,
        token: &IdempotencyToken,
    ) -> Result<Option<UploadId>, StageError> {
        provider_at(&self.uploaders, provider_index)?
            .find_by_token(token)
            .await
    }
}

#[async_trait]
impl Stage for UploadStage {
    type Input = UploadInput;
    type Output = UploadId;

    fn kind(&self) -> StageKind {
        StageKind::Upload
    }

    fn providers(&self) -> Vec<String> {
        self.uploaders.iter().map(|u| u.name().to_string()).collect()
    }

    fn quota_estimate(&self, _input: &UploadInput) -> Option<u64> {
        Some(self.units_per_upload)
    }

    async fn attempt(
        &self,
        provider_index: usize,
        input: &UploadInput,
    ) -> Result<Billed<UploadId>, StageError> {
        let uploader = provider_at(&self.uploaders, provider_index)?;
        if !self.first_send(provider_index, &input.token) {
            if let Some(id) = uploader.find_by_token(&input.token).await? {
                info!(provider = uploader.name(), upload_id = %id, "Earlier attempt was published");
                return Ok(Billed::new(id, self.units_per_upload));
            }
        }
        let metadata = self.template.render(&input.script);
        let id = uploader.upload(&input.video, &metadata, &input.token).await?;
        info!(provider = uploader.name(), upload_id = %id, "Video published");
        Ok(Billed::new(id, self.units_per_upload))
    }
}
