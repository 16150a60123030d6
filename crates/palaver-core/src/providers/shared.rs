//! Provider-agnostic types shared across backends.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard User-Agent header for palaver API requests.
pub const USER_AGENT: &str = concat!("palaver/", env!("CARGO_PKG_VERSION"));

/// Resolves an API key with precedence: config > env.
///
/// # Errors
/// Returns an error if neither the config value nor the environment
/// variable yields a non-empty key.
pub fn resolve_api_key(
    config_api_key: Option<&str>,
    env_var: &str,
    config_section: &str,
) -> Result<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    std::env::var(env_var).context(format!(
        "No API key available. Set {env_var} or api_key in [providers.{config_section}]."
    ))
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if a supplied URL is malformed.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

/// Categories of provider errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse the response body
    Parse,
    /// API-level or transport error from the provider
    ApiError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
        }
    }
}

/// Structured error from the provider with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, pulling the provider's `error.message`
    /// out of a JSON body when one is present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: ProviderErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Parse, message)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Maps transport-level reqwest failures onto the error taxonomy.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(format!("request timed out: {err}"))
    } else {
        ProviderError::new(ProviderErrorKind::ApiError, format!("request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `error.message` from a JSON body ends up in the one-line summary.
    #[test]
    fn test_http_status_extracts_json_error_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        let err = ProviderError::http_status(429, body);

        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 429: Resource has been exhausted");
        assert_eq!(err.details.as_deref(), Some(body));
    }

    #[test]
    fn test_http_status_plain_body_goes_to_details() {
        let err = ProviderError::http_status(500, "upstream exploded");
        assert_eq!(err.message, "HTTP 500");
        assert_eq!(err.details.as_deref(), Some("upstream exploded"));
    }

    #[test]
    fn test_http_status_empty_body_has_no_details() {
        let err = ProviderError::http_status(503, "");
        assert_eq!(err.message, "HTTP 503");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_resolve_api_key_prefers_config_over_env() {
        let key = resolve_api_key(Some("  config-key  "), "PALAVER_TEST_NO_SUCH_VAR", "gemini")
            .unwrap();
        assert_eq!(key, "config-key");
    }

    #[test]
    fn test_resolve_api_key_missing_everywhere_errors() {
        let err = resolve_api_key(Some("   "), "PALAVER_TEST_NO_SUCH_VAR", "gemini").unwrap_err();
        assert!(err.to_string().contains("No API key available"));
    }

    #[test]
    fn test_resolve_base_url_falls_back_to_default() {
        let url = resolve_base_url(
            None,
            "PALAVER_TEST_NO_SUCH_VAR",
            "https://example.com/v1",
            "Gemini",
        )
        .unwrap();
        assert_eq!(url, "https://example.com/v1");
    }

    #[test]
    fn test_resolve_base_url_rejects_invalid_config_url() {
        let result = resolve_base_url(
            Some("not a url"),
            "PALAVER_TEST_NO_SUCH_VAR",
            "https://example.com/v1",
            "Gemini",
        );
        assert!(result.is_err());
    }
}
