use crate::config::model_provider::ModelProvider;
use crate::error_handler::{ConfigError, Result, validate_http_endpoint};

/// Configuration for one model profile (embedding or rerank).
///
/// # Fields
///
/// - `provider`: which backend serves the profile.
/// - `model`: model identifier (e.g. `"bge-m3"`, `"text-embedding-3-small"`).
///   TEI ignores it, so it may be empty for [`ModelProvider::Tei`].
/// - `endpoint`: base URL without the API path.
/// - `api_key`: bearer token for hosted providers.
/// - `timeout_secs`: per-request HTTP timeout enforced by the client.
///
/// # Examples
///
/// ```
/// use model_service::{ModelConfig, ModelProvider};
///
/// let cfg = ModelConfig {
///     provider: ModelProvider::Ollama,
///     model: "bge-m3".to_string(),
///     endpoint: "http://localhost:11434".to_string(),
///     api_key: None,
///     timeout_secs: Some(30),
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Backend that serves this profile.
    pub provider: ModelProvider,

    /// Model identifier string.
    pub model: String,

    /// Base URL (scheme + host + optional port).
    pub endpoint: String,

    /// Optional API key (required for OpenAI).
    pub api_key: Option<String>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl ModelConfig {
    /// Validates the endpoint scheme, the model name and provider-specific
    /// requirements.
    ///
    /// # Errors
    /// Returns [`crate::ModelServiceError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if self.model.trim().is_empty() && self.provider != ModelProvider::Tei {
            return Err(ConfigError::EmptyModel.into());
        }
        if self.provider == ModelProvider::OpenAI
            && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingVar("EMBEDDING_API_KEY").into());
        }
        Ok(())
    }

    /// Endpoint with trailing slashes removed.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
