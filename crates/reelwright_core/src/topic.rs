//! Topic categories and how a request selects one.

use rand::Rng;
use rand::seq::SliceRandom;
use reelwright_error::InputError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A content category such as `prophets` or `moral_lessons`.
///
/// Categories are open-ended strings normalized to lowercase; the set a
/// deployment accepts comes from configuration, not from this type.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct TopicCategory(String);

impl TopicCategory {
    /// Create a category, trimming and lowercasing the name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// The category name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How a production request chooses its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSelection {
    /// Pick uniformly from the configured categories.
    Random,
    /// Use exactly this category.
    Named(TopicCategory),
}

impl TopicSelection {
    /// Resolve to a concrete category from the allowed set.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] when a named category is not in `allowed`
    /// or when `allowed` is empty.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        allowed: &[TopicCategory],
        rng: &mut R,
    ) -> Result<TopicCategory, InputError> {
        match self {
            TopicSelection::Random => allowed
                .choose(rng)
                .cloned()
                .ok_or_else(|| InputError::new("no topic categories configured")),
            TopicSelection::Named(category) => {
                if allowed.contains(category) {
                    Ok(category.clone())
                } else {
                    Err(InputError::new(format!(
                        "unsupported topic category '{}'",
                        category
                    )))
                }
            }
        }
    }
}

impl FromStr for TopicSelection {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InputError::new("topic category must not be empty"));
        }
        if trimmed.eq_ignore_ascii_case("random") {
            Ok(TopicSelection::Random)
        } else {
            Ok(TopicSelection::Named(TopicCategory::new(trimmed)))
        }
    }
}

impl Default for TopicSelection {
    fn default() -> Self {
        Self::Random
    }
}
