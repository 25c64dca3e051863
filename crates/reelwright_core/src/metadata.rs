//! Upload metadata rendering and title cleanup.

use crate::{Script, TopicCategory, UploadMetadata};
use derive_getters::Getters;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TITLE_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:-\s*|suggested title:\s*|title:\s*|عنوان مقترح:\s*|العنوان المقترح:\s*|العنوان:\s*|مقترح لعنوان:\s*)+",
    )
    .ok()
});

const TITLE_WRAPPERS: &[char] = &['"', '\'', '«', '»', '(', ')', '[', ']'];

/// Strip model chatter from a generated title.
///
/// Removes labels such as `Title:` or `Suggested Title:` and surrounding
/// quotes or brackets.
///
/// # Examples
///
/// ```
/// use reelwright_core::clean_title;
///
/// assert_eq!(clean_title("Suggested Title: \"The Patient Prophet\""), "The Patient Prophet");
/// assert_eq!(clean_title("  - «Ayyub»  "), "Ayyub");
/// ```
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = match TITLE_PREFIX.as_ref() {
        Some(re) => re.replace(trimmed, "").into_owned(),
        None => trimmed.to_string(),
    };
    stripped
        .trim()
        .trim_matches(TITLE_WRAPPERS)
        .trim()
        .to_string()
}

/// Title used when generation returns nothing usable.
pub fn fallback_title(category: &TopicCategory) -> String {
    match category.as_str() {
        "prophets" => "قصة نبي".to_string(),
        "sahaba" => "قصة صحابي".to_string(),
        "moral_lessons" => "عبرة وعظة".to_string(),
        "quran_stories" => "قصة قرآنية".to_string(),
        _ => "قصة إسلامية".to_string(),
    }
}

/// First `sentences` sentences of a story, each terminated by a period.
pub fn summarize(story: &str, sentences: usize) -> String {
    let parts: Vec<&str> = story
        .split(['.', '。', '!', '?', '؟'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(sentences)
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}.", parts.join(". "))
    }
}

/// Templates and fixed values for upload metadata.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct UploadTemplate {
    /// Title template; `{title}` is replaced by the script title.
    #[serde(default = "default_title_template")]
    title_template: String,
    /// Description template; `{summary}`, `{category}` and `{theme}` are replaced.
    #[serde(default = "default_description_template")]
    description_template: String,
    /// Tags added to every upload.
    #[serde(default)]
    tags: Vec<String>,
    /// Extra tags per category.
    #[serde(default)]
    topic_tags: BTreeMap<String, Vec<String>>,
    /// Platform category id.
    #[serde(default = "default_category_id")]
    category_id: String,
    /// Privacy status.
    #[serde(default = "default_privacy_status")]
    privacy_status: String,
    /// Audience declaration.
    #[serde(default)]
    made_for_kids: bool,
}

fn default_title_template() -> String {
    "{title}".to_string()
}

fn default_description_template() -> String {
    "{summary}".to_string()
}

fn default_category_id() -> String {
    "27".to_string()
}

fn default_privacy_status() -> String {
    "public".to_string()
}

impl Default for UploadTemplate {
    fn default() -> Self {
        Self {
            title_template: default_title_template(),
            description_template: default_description_template(),
            tags: Vec::new(),
            topic_tags: BTreeMap::new(),
            category_id: default_category_id(),
            privacy_status: default_privacy_status(),
            made_for_kids: false,
        }
    }
}

impl UploadTemplate {
    /// Render metadata for a script.
    pub fn render(&self, script: &Script) -> UploadMetadata {
        let title = self.title_template.replace("{title}", script.title());
        let description = self
            .description_template
            .replace("{summary}", &summarize(script.text(), 3))
            .replace("{category}", script.category().as_str())
            .replace("{theme}", script.theme());

        let mut tags: Vec<String> = Vec::new();
        let topic = self
            .topic_tags
            .get(script.category().as_str())
            .into_iter()
            .flatten();
        for tag in self
            .tags
            .iter()
            .chain(topic)
            .chain(std::iter::once(script.theme()))
        {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        UploadMetadata {
            title,
            description,
            tags,
            category_id: self.category_id.clone(),
            privacy_status: self.privacy_status.clone(),
            made_for_kids: self.made_for_kids,
        }
    }
}
