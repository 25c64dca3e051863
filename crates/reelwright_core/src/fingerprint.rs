//! Content fingerprints.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of normalized script text, hex encoded.
///
/// Normalization lowercases the text and collapses whitespace so that
/// trivially reformatted scripts collide.
///
/// # Examples
///
/// ```
/// use reelwright_core::Fingerprint;
///
/// let a = Fingerprint::of("Patience  is\na virtue");
/// let b = Fingerprint::of("patience is a virtue");
/// assert_eq!(a, b);
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a piece of text.
    pub fn of(text: &str) -> Self {
        let normalized = text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
