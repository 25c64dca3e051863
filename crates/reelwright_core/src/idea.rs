//! Content ideas drawn from platform trends.

use crate::TopicCategory;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A queued suggestion for a future production.
///
/// Ideas are produced by the trend refresh and consumed by the scheduler,
/// which turns each one into a production with a named category and theme.
///
/// # Examples
///
/// ```
/// use reelwright_core::{ContentIdea, TopicCategory};
///
/// let idea = ContentIdea::new(TopicCategory::new("Moral_Lessons"), " patience ")
///     .with_hook("The palm tree waits through the dry season.");
/// assert_eq!(idea.topic().as_str(), "moral_lessons");
/// assert_eq!(idea.theme(), "patience");
/// assert!(idea.same_subject(&ContentIdea::new(TopicCategory::new("moral_lessons"), "Patience")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ContentIdea {
    /// Category the production belongs to.
    topic: TopicCategory,
    /// Theme within the category.
    theme: String,
    /// Opening line suggested for the story.
    #[serde(default, alias = "hook_prompt", skip_serializing_if = "Option::is_none")]
    hook: Option<String>,
    /// Which trend inspired the idea.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rationale: Option<String>,
}

impl ContentIdea {
    /// An idea with a trimmed theme and no hook.
    pub fn new(topic: TopicCategory, theme: impl AsRef<str>) -> Self {
        Self {
            topic,
            theme: theme.as_ref().trim().to_string(),
            hook: None,
            rationale: None,
        }
    }

    /// Attach a suggested opening.
    pub fn with_hook(mut self, hook: impl Into<String>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    /// Attach the trend that inspired the idea.
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Same category and, ignoring case, the same theme.
    pub fn same_subject(&self, other: &ContentIdea) -> bool {
        self.topic == other.topic && self.theme.to_lowercase() == other.theme.to_lowercase()
    }
}
