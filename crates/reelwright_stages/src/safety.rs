//! Footage query safety policy.

use derive_getters::Getters;
use rand::seq::SliceRandom;
use reelwright_core::TopicCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How aggressively footage queries are constrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SafetyMode {
    /// Append mandatory modifiers to every query.
    #[default]
    Strict,
    /// Use keywords as given (after the denylist).
    Relaxed,
}

/// Turns script keywords into footage search queries.
///
/// The matching rules are product policy; the stage only asks for queries.
pub trait SafetyPolicy: Send + Sync + std::fmt::Debug {
    /// Queries to try, in order, for a script's keywords.
    fn queries(&self, category: &TopicCategory, keywords: &[String], mode: SafetyMode) -> Vec<String>;

    /// Queries to try when nothing matched.
    fn fallback_queries(&self, mode: SafetyMode) -> Vec<String>;
}

/// Denylist plus per-category default keywords.
///
/// Keywords containing a banned term are dropped; one default keyword for
/// the category is always added so a query list is never empty when
/// defaults exist.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default, setter(into))]
pub struct KeywordSafetyPolicy {
    /// Substrings that disqualify a keyword.
    #[serde(default)]
    banned_keywords: Vec<String>,
    /// Appended to every query in strict mode.
    #[serde(default)]
    mandatory_modifiers: String,
    /// Appended to every query (e.g. `-people`).
    #[serde(default)]
    negative_query: String,
    /// Default keywords per footage category.
    #[serde(default)]
    category_keywords: BTreeMap<String, Vec<String>>,
    /// Topic category to footage category.
    #[serde(default)]
    topic_footage: BTreeMap<String, String>,
    /// Footage category used when a search finds nothing.
    #[serde(default = "default_fallback_category")]
    fallback_category: String,
}

fn default_fallback_category() -> String {
    "nature".to_string()
}

impl Default for KeywordSafetyPolicy {
    fn default() -> Self {
        Self {
            banned_keywords: Vec::new(),
            mandatory_modifiers: String::new(),
            negative_query: String::new(),
            category_keywords: BTreeMap::new(),
            topic_footage: BTreeMap::new(),
            fallback_category: default_fallback_category(),
        }
    }
}

impl KeywordSafetyPolicy {
    fn is_banned(&self, keyword: &str) -> bool {
        self.banned_keywords
            .iter()
            .any(|banned| !banned.is_empty() && keyword.contains(&banned.to_lowercase()))
    }

    fn decorate(&self, keyword: &str, mode: SafetyMode) -> String {
        let mut terms = vec![keyword.to_string()];
        if mode == SafetyMode::Strict && !self.mandatory_modifiers.is_empty() {
            terms.push(self.mandatory_modifiers.clone());
        }
        format!("{} {}", terms.join(", "), self.negative_query)
            .trim()
            .to_string()
    }

    fn footage_category<'a>(&'a self, category: &'a TopicCategory) -> &'a str {
        self.topic_footage
            .get(category.as_str())
            .map(String::as_str)
            .unwrap_or(category.as_str())
    }
}

impl SafetyPolicy for KeywordSafetyPolicy {
    fn queries(&self, category: &TopicCategory, keywords: &[String], mode: SafetyMode) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut chosen: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            if self.is_banned(&keyword) {
                warn!(keyword = %keyword, "Blocked unsafe footage keyword");
                continue;
            }
            if !chosen.contains(&keyword) {
                chosen.push(keyword);
            }
        }

        if let Some(default) = self
            .category_keywords
            .get(self.footage_category(category))
            .and_then(|defaults| defaults.choose(&mut rng))
        {
            chosen.push(default.clone());
        }

        chosen.iter().map(|k| self.decorate(k, mode)).collect()
    }

    fn fallback_queries(&self, mode: SafetyMode) -> Vec<String> {
        self.category_keywords
            .get(&self.fallback_category)
            .map(|defaults| defaults.iter().map(|k| self.decorate(k, mode)).collect())
            .unwrap_or_default()
    }
}
