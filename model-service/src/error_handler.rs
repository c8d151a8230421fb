//! Unified error handling for `model-service`.
//!
//! This module exposes a single top-level error type [`ModelServiceError`] for the whole
//! library, and groups domain-specific errors in nested enums ([`ConfigError`],
//! [`HealthError`], [`ProviderError`]). Small helpers for reading/validating environment
//! variables are provided and return the unified [`Result<T>`] alias.
//!
//! All messages include the prefix `[Model Service]` to simplify attribution in logs.

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, ModelServiceError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `model-service` crate.
///
/// Variants wrap domain-specific enums (config/health/provider) and a few common
/// cases (HTTP transport, timeouts). Callers that need a retry decision should use
/// [`ModelServiceError::http_status`], [`ModelServiceError::retry_after`] and
/// [`ModelServiceError::is_timeout`] rather than matching on message text.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelServiceError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Health-check/connectivity/decoding errors.
    #[error(transparent)]
    Health(#[from] HealthError),

    /// Embedding or rerank call failed at the protocol level.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[Model Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[Model Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ModelServiceError {
    /// HTTP status returned by the upstream, if the failure carried one.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Provider(ProviderError::HttpStatus(e)) => Some(e.status),
            Self::Health(HealthError::HttpStatus(e)) => Some(e.status),
            Self::HttpTransport(e) => e.status(),
            _ => None,
        }
    }

    /// `Retry-After` hint parsed from the upstream response, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::HttpStatus(e)) => e.retry_after,
            _ => None,
        }
    }

    /// True for client-side or transport-level timeouts.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::HttpTransport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// True when the upstream could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::HttpTransport(e) if e.is_connect() || e.is_request())
    }

    /// True when the upstream answered but the payload was unusable.
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Provider(ProviderError::Decode(_) | ProviderError::CountMismatch { .. }) => true,
            Self::HttpTransport(e) => e.is_decode() || e.is_body(),
            _ => false,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* HTTP status payload                                                       */
/* ------------------------------------------------------------------------- */

/// Non-success HTTP response, shared by provider calls and health checks.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Numeric HTTP status code.
    pub status: StatusCode,
    /// Request URL.
    pub url: String,
    /// Short snippet of the response body (trimmed).
    pub snippet: String,
    /// Parsed `Retry-After` header (seconds form only).
    pub retry_after: Option<Duration>,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

impl HttpError {
    /// Drains a failed response into an [`HttpError`].
    pub async fn from_response(url: &str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let retry_after = parse_retry_after(resp.headers());
        let text = resp.text().await.unwrap_or_default();
        Self {
            status,
            url: url.to_string(),
            snippet: make_snippet(&text),
            retry_after,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[Model Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[Model Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `EMBEDDING_TIMEOUT_SECS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u64`).
        reason: &'static str,
    },

    /// Provider name not recognized, or not usable for the requested profile.
    #[error("[Model Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[Model Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `EMBEDDING_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// Model name was empty.
    #[error("[Model Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Errors raised by embedding and rerank clients once a request was attempted.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The config has a provider this client cannot serve.
    #[error("[Model Service] invalid provider for {0} client")]
    InvalidProvider(&'static str),

    /// Upstream returned a non-successful HTTP status.
    #[error("[Model Service] {0}")]
    HttpStatus(HttpError),

    /// Response payload could not be decoded as expected.
    #[error("[Model Service] decode error: {0}")]
    Decode(String),

    /// Upstream returned a different number of items than requested.
    #[error("[Model Service] expected {expected} items in response, got {got}")]
    CountMismatch {
        /// Number of inputs sent.
        expected: usize,
        /// Number of outputs received.
        got: usize,
    },
}

/* ------------------------------------------------------------------------- */
/* Health errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for provider health checks.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HealthError {
    /// The endpoint is empty or does not start with http/https.
    #[error("[Model Service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Upstream returned a non-successful HTTP status.
    #[error("[Model Service] {0}")]
    HttpStatus(HttpError),

    /// Health request could not be built or decoded.
    #[error("[Model Service] health decode error: {0}")]
    Decode(String),
}

/* ------------------------------------------------------------------------- */
/* Small helpers                                                             */
/* ------------------------------------------------------------------------- */

/// Trims a response body to a log-friendly snippet (240 chars max).
pub fn make_snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 240 {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(240).collect();
    s.push('…');
    s
}

/// Parses the delta-seconds form of `Retry-After`. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`ModelServiceError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Reads an optional, non-empty environment variable.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ModelServiceError::Config`] with [`ConfigError::InvalidNumber`] if the
/// variable is set but not a valid `u64`.
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    match env_opt(name) {
        Some(v) => v.trim().parse::<u64>().map(Some).map_err(|_| {
            ModelServiceError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        None => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ModelServiceError::Config`] with [`ConfigError::InvalidFormat`] when
/// the string does not start with a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
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
