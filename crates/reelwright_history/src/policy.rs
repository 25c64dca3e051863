//! Pluggable duplicate-topic policy.

use reelwright_core::{ProductionRecord, TopicCategory};
use std::collections::BTreeSet;

/// Decides whether a candidate category/theme repeats an earlier production.
pub trait DuplicatePolicy: Send + Sync + std::fmt::Debug {
    /// True when `existing` covers the same story angle as the candidate.
    fn is_duplicate(&self, category: &TopicCategory, theme: &str, existing: &ProductionRecord)
    -> bool;
}

/// Same category and a theme that is equal after normalization or shares
/// enough words (token Jaccard similarity at or above `threshold`).
///
/// # Examples
///
/// ```
/// use reelwright_history::ThemeSimilarityPolicy;
///
/// let policy = ThemeSimilarityPolicy::new(0.6);
/// assert!(policy.similarity("Patience in Hardship", "patience in hardship!") >= 1.0);
/// assert!(policy.similarity("patience", "gratitude") < 0.6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeSimilarityPolicy {
    threshold: f64,
}

impl ThemeSimilarityPolicy {
    /// Create a policy with a similarity threshold in `[0, 1]`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    fn tokens(theme: &str) -> BTreeSet<String> {
        theme
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Token Jaccard similarity of two themes.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = Self::tokens(a);
        let b = Self::tokens(b);
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let shared = a.intersection(&b).count() as f64;
        let union = a.union(&b).count() as f64;
        shared / union
    }
}

impl Default for ThemeSimilarityPolicy {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl DuplicatePolicy for ThemeSimilarityPolicy {
    fn is_duplicate(
        &self,
        category: &TopicCategory,
        theme: &str,
        existing: &ProductionRecord,
    ) -> bool {
        existing.category() == category && self.similarity(theme, existing.theme()) >= self.threshold
    }
}
