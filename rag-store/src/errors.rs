//! Unified error types for the crate.
//!
//! Two layers:
//! - [`ProviderError`]: failures of the injected capabilities (embedder, reranker, store),
//!   classified as [`FailureClass::Transient`] or [`FailureClass::Permanent`] for retry decisions.
//! - [`RagError`]: caller-visible failure of a whole operation.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result alias for rag-store operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Top-level error for rag-store operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Caller input rejected before any work was done (e.g. an empty query).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// A capability call on a required path failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Store-level failure on a required path (upsert/delete/get).
    #[error("store error: {0}")]
    Store(String),

    /// Both retrieval branches failed.
    #[error("retrieval failed: vector branch: {vector}; keyword branch: {keyword}")]
    Retrieval { vector: String, keyword: String },

    /// Caller aborted the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Failure of an external capability (embedding, rerank, store).
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Upstream asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Request exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused/reset or DNS failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("HTTP {status}: {snippet}")]
    Http { status: u16, snippet: String },

    /// Upstream rejected the input (malformed, too long, wrong dimension).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Credentials missing or refused.
    #[error("auth failure: {0}")]
    Auth(String),

    /// Response could not be decoded or had the wrong shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Capability not ready or temporarily unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Shut down locally; no later attempt can succeed.
    #[error("closed: {0}")]
    Closed(String),
}

/// Retry decision for a failed capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Worth retrying with backoff.
    Transient,
    /// Retrying cannot help.
    Permanent,
}

impl ProviderError {
    /// Server-provided backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Default classification: rate limits, timeouts, connection failures, 408/5xx and
/// unavailability are transient; everything else is permanent.
pub fn default_classify(err: &ProviderError) -> FailureClass {
    match err {
        ProviderError::RateLimited { .. }
        | ProviderError::Timeout(_)
        | ProviderError::Connection(_)
        | ProviderError::Unavailable(_) => FailureClass::Transient,
        ProviderError::Http { status, .. } if *status == 408 || *status >= 500 => {
            FailureClass::Transient
        }
        _ => FailureClass::Permanent,
    }
}
