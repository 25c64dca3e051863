//! Configuration error types.

/// A setting that cannot be used as written.
///
/// Covers unreadable or malformed configuration layers, values that fail
/// validation after deserialization, and provider API keys missing from the
/// environment. Every one of them is an operator mistake, so the binary
/// reports it with the usage exit code.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What is wrong with the configuration.
    pub message: String,
    /// Dotted key or environment variable at fault, when one is known.
    pub setting: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Error not tied to one setting, such as an unparsable file.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelwright_error::ConfigError;
    ///
    /// let err = ConfigError::new("Failed to parse configuration: expected a table");
    /// assert!(err.setting.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            setting: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Error blamed on one setting, like `scheduler.batch_size` or
    /// `OPENAI_API_KEY`.
    ///
    /// ```
    /// use reelwright_error::ConfigError;
    ///
    /// let err = ConfigError::for_setting("retry.max_attempts", "must be at least 1");
    /// assert_eq!(err.setting.as_deref(), Some("retry.max_attempts"));
    /// assert_eq!(err.message, "retry.max_attempts: must be at least 1");
    /// ```
    #[track_caller]
    pub fn for_setting(setting: impl Into<String>, problem: impl AsRef<str>) -> Self {
        let location = std::panic::Location::caller();
        let setting = setting.into();
        Self {
            message: format!("{}: {}", setting, problem.as_ref()),
            setting: Some(setting),
            line: location.line(),
            file: location.file(),
        }
    }
}
