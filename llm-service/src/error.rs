//! Unified error handling for `llm-service`.
//!
//! One top-level [`LlmError`] for the whole crate, with configuration
//! problems grouped in [`ConfigError`]. HTTP failures are normalized into a
//! small taxonomy so callers can tell retryable conditions (rate limit, 5xx,
//! transport timeout) from permanent ones.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Unified result alias for the entire crate.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Top-level error for the `llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration/validation errors (startup time).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Upstream rejected the request with 429.
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Upstream returned a 5xx status.
    #[error("provider server error: status {status}")]
    Server { status: u16, snippet: String },

    /// Any other non-successful HTTP status.
    #[error("unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Transport-level timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Network/transport failure without a status (DNS/connect/reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Response payload could not be decoded as expected.
    #[error("decode error: {0}")]
    Decode(String),
}

impl LlmError {
    /// Whether this failure is worth retrying with backoff.
    ///
    /// Retryable: rate limits, 5xx, transport timeouts and resets.
    /// Everything else (4xx, config, decode) is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Server { .. }
                | LlmError::Timeout(_)
                | LlmError::Transport(_)
        )
    }
}

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (ports, limits, timeouts).
    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Unsupported provider name.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g. endpoint without http/https scheme).
    #[error("invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("{field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("model name must not be empty")]
    EmptyModel,

    /// API key required by the provider but not configured.
    #[error("missing api key for provider")]
    MissingApiKey,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured timeout here; callers
            // that know it attach the real duration via map_err.
            return LlmError::Timeout(Duration::from_secs(0));
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                429 => LlmError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => LlmError::Server {
                    status: code,
                    snippet: String::new(),
                },
                _ => LlmError::HttpStatus {
                    status,
                    url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                    snippet: String::new(),
                },
            };
        }
        LlmError::Transport(e.to_string())
    }
}

/// Maps a non-2xx response into the taxonomy, keeping a short body snippet.
pub(crate) fn status_error(status: StatusCode, url: &str, body: &str) -> LlmError {
    let snippet = make_snippet(body);
    match status.as_u16() {
        429 => LlmError::RateLimited {
            retry_after_secs: None,
        },
        code @ 500..=599 => LlmError::Server {
            status: code,
            snippet,
        },
        _ => LlmError::HttpStatus {
            status,
            url: url.to_string(),
            snippet,
        },
    }
}

/// Trims a response body down to a log-safe snippet.
pub(crate) fn make_snippet(text: &str) -> String {
    text.chars().take(240).collect()
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `LlmResult<T>`)                               */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> LlmResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u32(name: &'static str) -> LlmResult<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.parse::<u32>().map(Some).map_err(|_| {
            LlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        _ => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> LlmResult<Option<u64>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.parse::<u64>().map(Some).map_err(|_| {
            LlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        _ => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> LlmResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> LlmResult<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}
