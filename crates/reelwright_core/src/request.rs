//! Production requests.

use crate::{ContentIdea, RecordId, TopicSelection};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A caller's request for one production.
///
/// Issued by the CLI or the scheduler and never modified afterwards.
///
/// # Examples
///
/// ```
/// use reelwright_core::{ProductionRequestBuilder, TopicSelection};
///
/// let request = ProductionRequestBuilder::default()
///     .topic("prophets".parse::<TopicSelection>().unwrap())
///     .theme(Some("patience".to_string()))
///     .build()
///     .unwrap();
/// assert!(*request.upload_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
pub struct ProductionRequest {
    /// Category to produce, or random.
    #[builder(default)]
    #[serde(default)]
    topic: TopicSelection,

    /// Theme within the category; picked from configuration when absent.
    #[builder(default)]
    #[serde(default)]
    theme: Option<String>,

    /// Whether the upload stage runs. `false` is a dry run.
    #[builder(default = "true")]
    #[serde(default = "default_upload_enabled")]
    upload_enabled: bool,

    /// Prior record this production retries.
    #[builder(default)]
    #[serde(default)]
    retry_of: Option<RecordId>,
}

fn default_upload_enabled() -> bool {
    true
}

impl ProductionRequest {
    /// A request for a random topic with uploads enabled.
    pub fn random() -> Self {
        Self {
            topic: TopicSelection::Random,
            theme: None,
            upload_enabled: true,
            retry_of: None,
        }
    }

    /// This request narrowed to the idea's category and theme.
    ///
    /// ```
    /// use reelwright_core::{ContentIdea, ProductionRequest, TopicCategory, TopicSelection};
    ///
    /// let idea = ContentIdea::new(TopicCategory::new("sahaba"), "honesty");
    /// let request = ProductionRequest::random().for_idea(&idea);
    /// assert_eq!(request.topic(), &TopicSelection::Named(TopicCategory::new("sahaba")));
    /// assert_eq!(request.theme().as_deref(), Some("honesty"));
    /// assert!(*request.upload_enabled());
    /// ```
    pub fn for_idea(&self, idea: &ContentIdea) -> Self {
        Self {
            topic: TopicSelection::Named(idea.topic().clone()),
            theme: Some(idea.theme().clone()),
            ..self.clone()
        }
    }
}
