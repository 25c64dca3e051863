//! Translation of provider HTTP failures into stage errors.

use reelwright_error::StageError;
use reqwest::Response;
use tracing::error;

/// Body fragments that mean the provider's own budget is spent.
const QUOTA_MARKERS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "insufficient_quota",
    "RESOURCE_EXHAUSTED",
    "billing_hard_limit",
];

/// Classify a non-success HTTP status and its body.
///
/// | Status | Kind |
/// |---|---|
/// | body reports exhausted quota | `QuotaExceeded` |
/// | 408, 425, 429, 5xx | `Transient` |
/// | anything else | `Terminal` |
///
/// # Examples
///
/// ```
/// use reelwright_error::StageErrorKind;
/// use reelwright_providers::classify_status;
///
/// assert!(matches!(classify_status("pexels", 503, "").kind, StageErrorKind::Transient(_)));
/// assert!(matches!(classify_status("openai", 401, "").kind, StageErrorKind::Terminal(_)));
/// assert!(matches!(
///     classify_status("youtube", 403, r#"{"reason":"quotaExceeded"}"#).kind,
///     StageErrorKind::QuotaExceeded(_)
/// ));
/// ```
pub fn classify_status(provider: &str, status: u16, body: &str) -> StageError {
    let snippet: String = body.chars().take(300).collect();
    let message = format!("{} returned HTTP {}: {}", provider, status, snippet);

    if QUOTA_MARKERS.iter().any(|marker| body.contains(marker)) {
        return StageError::quota_exceeded(message);
    }
    match status {
        408 | 425 | 429 | 500..=599 => StageError::transient(message),
        _ => StageError::terminal(message),
    }
}

/// Classify a transport-level failure.
///
/// Timeouts, connection failures and truncated bodies are transient;
/// malformed requests and redirect loops are terminal.
pub fn classify_transport(provider: &str, err: &reqwest::Error) -> StageError {
    let message = format!("{} request failed: {}", provider, err);
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        StageError::transient(message)
    } else if let Some(status) = err.status() {
        classify_status(provider, status.as_u16(), "")
    } else {
        StageError::terminal(message)
    }
}

/// Pass through a successful response, classify anything else.
pub(crate) async fn ensure_success(provider: &str, response: Response) -> Result<Response, StageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(provider, status = %status, body = %body, "Provider returned error");
    Err(classify_status(provider, status.as_u16(), &body))
}

/// Decode a JSON body, treating a malformed payload as terminal.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, StageError> {
    let response = ensure_success(provider, response).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_body() || e.is_timeout() {
            classify_transport(provider, &e)
        } else {
            StageError::terminal(format!("{} returned an unreadable response: {}", provider, e))
        }
    })
}

/// Read an API key from the named environment variable.
pub(crate) fn api_key_from_env(var: &str) -> Result<String, reelwright_error::ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| reelwright_error::ConfigError::for_setting(var, "not set"))
}
