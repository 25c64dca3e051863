//! Stage failure taxonomy.

/// Kinds of stage errors.
///
/// This is the only vocabulary a stage executor uses to report failure.
/// The orchestrator branches on the variant and never on provider codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StageErrorKind {
    /// Retryable failure (network blip, rate limit, timeout, 5xx)
    #[display("Transient failure: {}", _0)]
    Transient(String),
    /// Non-retryable failure (bad credentials, rejected input, unsupported topic)
    #[display("Terminal failure: {}", _0)]
    Terminal(String),
    /// Provider budget exhausted, either by local policy or provider report
    #[display("Quota exceeded: {}", _0)]
    QuotaExceeded(String),
}

/// Stage error with location tracking.
///
/// # Examples
///
/// ```
/// use reelwright_error::{RetryableError, StageError};
///
/// let err = StageError::transient("HTTP 503 from synthesis backend");
/// assert!(err.is_retryable());
/// assert!(!StageError::terminal("HTTP 401").is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Stage Error: {} at line {} in {}", kind, line, file)]
pub struct StageError {
    /// The kind of error that occurred
    pub kind: StageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StageError {
    /// Create a new stage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a transient error.
    #[track_caller]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Transient(message.into()))
    }

    /// Shorthand for a terminal error.
    #[track_caller]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Terminal(message.into()))
    }

    /// Shorthand for a quota error.
    #[track_caller]
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::QuotaExceeded(message.into()))
    }

    /// The message carried by the kind, without the variant prefix.
    pub fn message(&self) -> &str {
        match &self.kind {
            StageErrorKind::Transient(m)
            | StageErrorKind::Terminal(m)
            | StageErrorKind::QuotaExceeded(m) => m,
        }
    }

    /// Whether the error came from a quota policy rather than the provider call itself.
    pub fn is_quota(&self) -> bool {
        matches!(self.kind, StageErrorKind::QuotaExceeded(_))
    }
}

/// Trait for errors that can be classified as retryable.
///
/// Used by the stage retry loop to decide between another attempt with
/// backoff and an immediate stop.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    ///
    /// Transient errors like 503, 429 or network timeouts return true.
    /// Terminal and quota errors return false.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for StageErrorKind {
    fn is_retryable(&self) -> bool {
        matches!(self, StageErrorKind::Transient(_))
    }
}

impl RetryableError for StageError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
