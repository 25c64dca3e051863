//! Scripted collaborator doubles.
//!
//! Enabled with the `testing` feature. Each mock counts its calls and
//! replays a configured [`MockBehavior`], so tests can drive retries,
//! fallbacks and quota refusals without touching the network.

use crate::{
    FootageSource, IdeaGenerator, SafetyMode, ScriptGenerator, SpeechSynthesizer, TrendSource,
    Uploader, VideoComposer,
};
use async_trait::async_trait;
use reelwright_core::{
    AudioHandle, Billed, ContentIdea, IdempotencyToken, MediaHandle, Script, ScriptBuilder,
    TopicCategory, UploadId, UploadMetadata, VideoHandle,
};
use reelwright_error::{StageError, StageErrorKind};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Behavior configuration for mock responses.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    /// Always succeed with the value
    Success(T),
    /// Always fail with the error
    Error(StageErrorKind),
    /// Fail N times with the error, then succeed with the value
    FailThenSucceed {
        /// Failures before the first success
        fail_count: usize,
        /// Error returned while failing
        error: StageErrorKind,
        /// Value returned afterwards
        value: T,
    },
    /// Replay responses in order; the last one repeats
    Sequence(Vec<MockResponse<T>>),
}

/// A single mock response (success or error).
#[derive(Debug, Clone)]
pub enum MockResponse<T> {
    /// Successful value
    Success(T),
    /// Failure
    Error(StageErrorKind),
}

/// Call counter plus behavior shared by every mock.
#[derive(Debug)]
struct Scripted<T> {
    behavior: MockBehavior<T>,
    call_count: Arc<Mutex<usize>>,
}

impl<T: Clone> Scripted<T> {
    fn new(behavior: MockBehavior<T>) -> Self {
        Self {
            behavior,
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    fn calls(&self) -> usize {
        *lock(&self.call_count)
    }

    fn next(&self) -> Result<T, StageError> {
        let mut count = lock(&self.call_count);
        let current = *count;
        *count += 1;

        match &self.behavior {
            MockBehavior::Success(value) => Ok(value.clone()),
            MockBehavior::Error(kind) => Err(StageError::new(kind.clone())),
            MockBehavior::FailThenSucceed {
                fail_count,
                error,
                value,
            } => {
                if current < *fail_count {
                    Err(StageError::new(error.clone()))
                } else {
                    Ok(value.clone())
                }
            }
            MockBehavior::Sequence(responses) => {
                let response = responses
                    .get(current)
                    .or_else(|| responses.last())
                    .ok_or_else(|| StageError::terminal("empty mock sequence"))?;
                match response {
                    MockResponse::Success(value) => Ok(value.clone()),
                    MockResponse::Error(kind) => Err(StageError::new(kind.clone())),
                }
            }
        }
    }
}

/// A plausible script for tests.
pub fn sample_script(category: &str, theme: &str) -> Script {
    ScriptBuilder::default()
        .title(format!("A story of {}", theme))
        .text(format!(
            "Once there was a lesson about {}. It was told again and again. Everyone remembered it.",
            theme
        ))
        .visual_keywords(vec!["desert".to_string(), "sunrise".to_string()])
        .category(TopicCategory::new(category))
        .theme(theme)
        .build()
        .unwrap_or_else(|_| unreachable!("all required fields are set"))
}

/// Mock script generator.
#[derive(Debug)]
pub struct MockScriptGenerator {
    name: String,
    scripted: Scripted<Script>,
    cost: u64,
    requests: Mutex<Vec<(TopicCategory, String)>>,
}

impl MockScriptGenerator {
    /// Generator that always returns `script`.
    pub fn new_success(name: impl Into<String>, script: Script) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(script))
    }

    /// Generator with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<Script>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
            cost: 100,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Override the billed cost per call.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }

    /// Category and theme of every call, in order.
    pub fn requests(&self) -> Vec<(TopicCategory, String)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ScriptGenerator for MockScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_script(
        &self,
        category: &TopicCategory,
        theme: &str,
    ) -> Result<Billed<Script>, StageError> {
        lock(&self.requests).push((category.clone(), theme.to_string()));
        let script = self.scripted.next()?;
        Ok(Billed::new(script, self.cost))
    }
}

/// Mock speech synthesizer billing one unit per character.
#[derive(Debug)]
pub struct MockSynthesizer {
    name: String,
    scripted: Scripted<f64>,
}

impl MockSynthesizer {
    /// Synthesizer producing narration of `duration_secs`.
    pub fn new_success(name: impl Into<String>, duration_secs: f64) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(duration_secs))
    }

    /// Synthesizer with custom behavior; values are durations.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<f64>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, text: &str, output: &Path) -> Result<Billed<AudioHandle>, StageError> {
        let duration = self.scripted.next()?;
        Ok(Billed::new(
            AudioHandle::new(output, duration),
            text.chars().count() as u64,
        ))
    }
}

/// Mock footage source.
#[derive(Debug)]
pub struct MockFootageSource {
    name: String,
    scripted: Scripted<Vec<MediaHandle>>,
    queries: Mutex<Vec<Vec<String>>>,
}

impl MockFootageSource {
    /// Source returning `count` portrait clips.
    pub fn new_success(name: impl Into<String>, count: usize) -> Self {
        let clips = (0..count)
            .map(|i| MediaHandle::new(format!("clip-{}.mp4", i), format!("mock-{}", i), 8.0, 1080, 1920))
            .collect();
        Self::new_with_behavior(name, MockBehavior::Success(clips))
    }

    /// Source with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<Vec<MediaHandle>>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }

    /// Queries of every call, in order.
    pub fn queries(&self) -> Vec<Vec<String>> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl FootageSource for MockFootageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_footage(
        &self,
        queries: &[String],
        _mode: SafetyMode,
        _min_duration: f64,
    ) -> Result<Vec<MediaHandle>, StageError> {
        lock(&self.queries).push(queries.to_vec());
        self.scripted.next()
    }
}

/// Mock composer returning a video as long as the narration.
#[derive(Debug)]
pub struct MockComposer {
    name: String,
    scripted: Scripted<()>,
}

impl MockComposer {
    /// Composer that always succeeds.
    pub fn new_success(name: impl Into<String>) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(()))
    }

    /// Composer with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<()>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }
}

#[async_trait]
impl VideoComposer for MockComposer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compose(
        &self,
        audio: &AudioHandle,
        _media: &[MediaHandle],
        _script: &Script,
        output: &Path,
    ) -> Result<VideoHandle, StageError> {
        self.scripted.next()?;
        Ok(VideoHandle::new(output, *audio.duration_secs()))
    }
}

/// Mock platform that remembers videos by idempotency token.
///
/// With [`MockUploader::losing_responses`] the first N uploads are
/// published but reported back as transient failures, the way a dropped
/// connection looks to the client.
#[derive(Debug)]
pub struct MockUploader {
    name: String,
    scripted: Scripted<()>,
    lose_responses: Mutex<usize>,
    published: Mutex<HashMap<IdempotencyToken, UploadId>>,
    metadata: Mutex<Vec<UploadMetadata>>,
    next_id: Mutex<usize>,
}

impl MockUploader {
    /// Uploader that always succeeds.
    pub fn new_success(name: impl Into<String>) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(()))
    }

    /// Uploader with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<()>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
            lose_responses: Mutex::new(0),
            published: Mutex::new(HashMap::new()),
            metadata: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Publish but drop the response for the first `count` uploads.
    pub fn losing_responses(self, count: usize) -> Self {
        *lock(&self.lose_responses) = count;
        self
    }

    /// Number of upload calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }

    /// Number of distinct videos on the platform.
    pub fn published_count(&self) -> usize {
        lock(&self.published).len()
    }

    /// Metadata of every upload call, in order.
    pub fn metadata(&self) -> Vec<UploadMetadata> {
        lock(&self.metadata).clone()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        _video: &VideoHandle,
        metadata: &UploadMetadata,
        token: &IdempotencyToken,
    ) -> Result<UploadId, StageError> {
        lock(&self.metadata).push(metadata.clone());
        self.scripted.next()?;

        let id = {
            let mut published = lock(&self.published);
            let mut next_id = lock(&self.next_id);
            published
                .entry(token.clone())
                .or_insert_with(|| {
                    *next_id += 1;
                    UploadId::new(format!("video-{}", *next_id))
                })
                .clone()
        };

        let mut lose = lock(&self.lose_responses);
        if *lose > 0 {
            *lose -= 1;
            return Err(StageError::transient("connection reset after upload"));
        }
        Ok(id)
    }

    async fn find_by_token(&self, token: &IdempotencyToken) -> Result<Option<UploadId>, StageError> {
        Ok(lock(&self.published).get(token).cloned())
    }
}

/// Mock trend source.
#[derive(Debug)]
pub struct MockTrendSource {
    name: String,
    scripted: Scripted<Vec<String>>,
}

impl MockTrendSource {
    /// Source that always reports `titles`.
    pub fn new_success(name: impl Into<String>, titles: Vec<String>) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(titles))
    }

    /// Source with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }
}

#[async_trait]
impl TrendSource for MockTrendSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn trending_titles(&self, _queries: &[String]) -> Result<Vec<String>, StageError> {
        self.scripted.next()
    }
}

/// Mock idea generator.
///
/// On success each trend becomes one idea whose theme is the trend title,
/// spread over the offered categories in order.
#[derive(Debug)]
pub struct MockIdeaGenerator {
    name: String,
    scripted: Scripted<()>,
    trends: Mutex<Vec<Vec<String>>>,
}

impl MockIdeaGenerator {
    /// Generator that always succeeds.
    pub fn new_success(name: impl Into<String>) -> Self {
        Self::new_with_behavior(name, MockBehavior::Success(()))
    }

    /// Generator with custom behavior.
    pub fn new_with_behavior(name: impl Into<String>, behavior: MockBehavior<()>) -> Self {
        Self {
            name: name.into(),
            scripted: Scripted::new(behavior),
            trends: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.scripted.calls()
    }

    /// Trends passed to every call, in order.
    pub fn trends(&self) -> Vec<Vec<String>> {
        lock(&self.trends).clone()
    }
}

#[async_trait]
impl IdeaGenerator for MockIdeaGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_ideas(
        &self,
        trends: &[String],
        categories: &[TopicCategory],
        count: usize,
    ) -> Result<Billed<Vec<ContentIdea>>, StageError> {
        lock(&self.trends).push(trends.to_vec());
        self.scripted.next()?;
        let ideas = trends
            .iter()
            .zip(categories.iter().cycle())
            .take(count)
            .map(|(trend, category)| ContentIdea::new(category.clone(), trend).with_rationale(trend))
            .collect();
        Ok(Billed::new(ideas, 10))
    }
}
