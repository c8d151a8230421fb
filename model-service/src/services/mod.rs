pub mod ollama_service;
pub mod open_ai_service;
pub mod rerank_service;

use std::time::Duration;

use reqwest::header;

use crate::config::model_config::ModelConfig;
use crate::error_handler::{ConfigError, Result};

/// Builds the pooled HTTP client shared by every call of one profile.
pub(crate) fn build_client(cfg: &ModelConfig, default_timeout: Duration) -> Result<reqwest::Client> {
    let timeout = cfg
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);

    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?)
}

/// `Authorization: Bearer <key>` header value.
pub(crate) fn bearer(api_key: &str) -> Result<header::HeaderValue> {
    header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        ConfigError::InvalidFormat {
            var: "api_key",
            reason: "not a valid header value",
        }
        .into()
    })
}
