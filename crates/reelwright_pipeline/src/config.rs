//! Content and pipeline settings.

use derive_getters::Getters;
use reelwright_core::TopicCategory;
use reelwright_stages::SafetyMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to produce.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Allowed topic categories.
    #[serde(default = "default_topics")]
    topics: Vec<String>,
    /// Themes picked from when a request names none.
    #[serde(default = "default_themes")]
    themes: Vec<String>,
    /// Target narration length in seconds.
    #[serde(default = "default_length_seconds")]
    length_seconds: u32,
}

fn default_topics() -> Vec<String> {
    ["prophets", "sahaba", "moral_lessons", "quran_stories"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_themes() -> Vec<String> {
    [
        "faith",
        "patience",
        "gratitude",
        "honesty",
        "kindness",
        "forgiveness",
        "perseverance",
        "humility",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

fn default_length_seconds() -> u32 {
    60
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            themes: default_themes(),
            length_seconds: default_length_seconds(),
        }
    }
}

impl ContentConfig {
    /// Content settings from explicit lists.
    pub fn new(topics: Vec<String>, themes: Vec<String>, length_seconds: u32) -> Self {
        Self {
            topics,
            themes,
            length_seconds,
        }
    }

    /// Topic categories, normalized.
    pub fn categories(&self) -> Vec<TopicCategory> {
        self.topics.iter().map(TopicCategory::new).collect()
    }
}

/// How productions run.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records searched for duplicate topics and scripts.
    #[serde(default = "default_duplicate_lookback")]
    duplicate_lookback: usize,
    /// Theme similarity at which two themes count as the same.
    #[serde(default = "default_similarity_threshold")]
    similarity_threshold: f64,
    /// Rendered videos.
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    /// Intermediate files such as narration audio.
    #[serde(default = "default_work_dir")]
    work_dir: PathBuf,
    /// In-progress productions.
    #[serde(default = "default_checkpoint_dir")]
    checkpoint_dir: PathBuf,
    /// Footage query constraints.
    #[serde(default)]
    safety_mode: SafetyMode,
    /// Shortest usable clip in seconds.
    #[serde(default = "default_min_clip_secs")]
    min_clip_secs: f64,
    /// Most clips per video.
    #[serde(default = "default_max_clips")]
    max_clips: usize,
    /// Quota units charged per upload.
    #[serde(default = "default_upload_units")]
    upload_units: u64,
}

fn default_duplicate_lookback() -> usize {
    30
}

fn default_similarity_threshold() -> f64 {
    0.6
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_min_clip_secs() -> f64 {
    5.0
}

fn default_max_clips() -> usize {
    5
}

fn default_upload_units() -> u64 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            duplicate_lookback: default_duplicate_lookback(),
            similarity_threshold: default_similarity_threshold(),
            output_dir: default_output_dir(),
            work_dir: default_work_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            safety_mode: SafetyMode::default(),
            min_clip_secs: default_min_clip_secs(),
            max_clips: default_max_clips(),
            upload_units: default_upload_units(),
        }
    }
}

impl PipelineConfig {
    /// Put every directory under `root`.
    pub fn rooted_at(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.output_dir = root.join(&self.output_dir);
        self.work_dir = root.join(&self.work_dir);
        self.checkpoint_dir = root.join(&self.checkpoint_dir);
        self
    }

    /// Override the duplicate lookback window.
    pub fn with_duplicate_lookback(mut self, lookback: usize) -> Self {
        self.duplicate_lookback = lookback;
        self
    }
}
