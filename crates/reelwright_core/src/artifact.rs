//! Artifacts handed from one stage to the next.
//!
//! Handles are plain data (paths plus measurements) so they can be written
//! into a checkpoint and restored when a production resumes.

use crate::{RecordId, TopicCategory};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collaborator output paired with the cost the provider billed for it.
///
/// The cost is what the quota tracker commits, which may differ from the
/// estimate reserved before the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Billed<T> {
    /// The produced value.
    pub value: T,
    /// Units consumed (characters, requests, uploads).
    pub cost: u64,
}

impl<T> Billed<T> {
    /// Pair a value with its cost.
    pub fn new(value: T, cost: u64) -> Self {
        Self { value, cost }
    }
}

/// Generated narration script.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Script {
    /// Cleaned title.
    title: String,
    /// Story text read by the narrator.
    text: String,
    /// Search terms for footage.
    #[builder(default)]
    #[serde(default)]
    visual_keywords: Vec<String>,
    /// Category the script was written for.
    category: TopicCategory,
    /// Theme the script was written for.
    theme: String,
}

impl Script {
    /// Number of words in the story text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Synthesized narration on disk.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct AudioHandle {
    /// Audio file.
    path: PathBuf,
    /// Estimated playback length in seconds.
    duration_secs: f64,
}

impl AudioHandle {
    /// Create a handle for an audio file.
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }
}

/// One downloaded footage clip.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct MediaHandle {
    /// Local clip file.
    path: PathBuf,
    /// Identifier at the footage source.
    source_id: String,
    /// Clip length in seconds.
    duration_secs: f64,
    /// Pixel width.
    #[serde(default)]
    width: u32,
    /// Pixel height.
    #[serde(default)]
    height: u32,
}

impl MediaHandle {
    /// Create a handle for a clip.
    pub fn new(
        path: impl Into<PathBuf>,
        source_id: impl Into<String>,
        duration_secs: f64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            path: path.into(),
            source_id: source_id.into(),
            duration_secs,
            width,
            height,
        }
    }

    /// Portrait clips are taller than they are wide.
    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

/// Composed video ready for upload.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct VideoHandle {
    /// Rendered video file.
    path: PathBuf,
    /// Length in seconds.
    duration_secs: f64,
}

impl VideoHandle {
    /// Create a handle for a rendered video.
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }
}

/// Platform-side identifier of a published video.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::From,
)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Wrap a platform id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Locally generated token that lets the uploader recognize a video it
/// already published for this production.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    /// Token derived from the record id, stable across resumes.
    pub fn for_record(id: &RecordId) -> Self {
        Self(format!("rw-{}", id.as_uuid().simple()))
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Title, description and tags sent with an upload.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct UploadMetadata {
    /// Video title.
    pub(crate) title: String,
    /// Video description.
    pub(crate) description: String,
    /// Search tags.
    #[builder(default)]
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    /// Platform category id.
    #[builder(default = "\"27\".to_string()")]
    #[serde(default)]
    pub(crate) category_id: String,
    /// `public`, `unlisted` or `private`.
    #[builder(default = "\"public\".to_string()")]
    #[serde(default)]
    pub(crate) privacy_status: String,
    /// Audience declaration required by the platform.
    #[builder(default)]
    #[serde(default)]
    pub(crate) made_for_kids: bool,
}
