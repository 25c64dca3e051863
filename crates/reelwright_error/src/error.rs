//! Top-level error wrapper types.

use crate::{ConfigError, InputError, QuotaError, StageError, StorageError};

/// Aggregate of every error the Reelwright crates can return.
///
/// # Examples
///
/// ```
/// use reelwright_error::{ReelwrightError, ConfigError};
///
/// let err: ReelwrightError = ConfigError::new("missing history path").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ReelwrightErrorKind {
    /// Stage executor error
    #[from(StageError)]
    Stage(StageError),
    /// Quota tracker error
    #[from(QuotaError)]
    Quota(QuotaError),
    /// History, ledger or checkpoint storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Invalid caller input
    #[from(InputError)]
    Input(InputError),
}

/// Reelwright error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Reelwright Error: {}", _0)]
pub struct ReelwrightError(Box<ReelwrightErrorKind>);

impl ReelwrightError {
    /// Create a new error from a kind.
    pub fn new(kind: ReelwrightErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ReelwrightErrorKind {
        &self.0
    }

    /// True when the error is a provider budget being exhausted.
    pub fn is_quota_exceeded(&self) -> bool {
        match self.kind() {
            ReelwrightErrorKind::Quota(e) => e.is_exceeded(),
            ReelwrightErrorKind::Stage(e) => e.is_quota(),
            _ => false,
        }
    }

    /// True for configuration and input problems the operator must fix before rerunning.
    pub fn is_usage(&self) -> bool {
        matches!(
            self.kind(),
            ReelwrightErrorKind::Config(_) | ReelwrightErrorKind::Input(_)
        )
    }
}

// Generic From implementation for any type that converts to ReelwrightErrorKind
impl<T> From<T> for ReelwrightError
where
    T: Into<ReelwrightErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Reelwright operations.
pub type ReelwrightResult<T> = std::result::Result<T, ReelwrightError>;
