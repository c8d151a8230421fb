//! Lightweight Ollama client for batched embeddings.
//!
//! Uses `POST {endpoint}/api/embed`, which accepts an array of inputs and
//! returns one vector per input in request order.
//!
//! # Examples
//!
//! ```no_run
//! use model_service::{ModelConfig, ModelProvider};
//! use model_service::services::ollama_service::OllamaService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ModelConfig {
//!     provider: ModelProvider::Ollama,
//!     model: "bge-m3".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     api_key: None,
//!     timeout_secs: Some(30),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let vecs = svc.embed_batch(&["Ferris is a friendly crab.".to_string()]).await?;
//! println!("dimension = {}", vecs[0].len());
//! # Ok(()) }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::model_config::ModelConfig;
use crate::config::model_provider::ModelProvider;
use crate::error_handler::{HttpError, ProviderError, Result};
use crate::services::build_client;

/// Thin client for Ollama embeddings.
pub struct OllamaService {
    client: reqwest::Client,
    cfg: ModelConfig,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - [`ProviderError::InvalidProvider`] if `cfg.provider` is not `Ollama`
    /// - config errors if the endpoint is invalid
    /// - transport errors if the HTTP client cannot be built
    pub fn new(cfg: ModelConfig) -> Result<Self> {
        if cfg.provider != ModelProvider::Ollama {
            return Err(ProviderError::InvalidProvider("Ollama").into());
        }
        cfg.validate()?;

        let client = build_client(&cfg, Duration::from_secs(60))?;
        let url_embed = format!("{}/api/embed", cfg.base_url());

        Ok(Self {
            client,
            cfg,
            url_embed,
        })
    }

    /// Model identifier used for every request.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Embeds `inputs` in one request via `/api/embed`.
    ///
    /// The output has exactly one vector per input, in input order.
    ///
    /// # Errors
    /// - [`ProviderError::HttpStatus`] for non-2xx responses (carries `Retry-After`)
    /// - transport errors for client failures and timeouts
    /// - [`ProviderError::Decode`] / [`ProviderError::CountMismatch`] for bad payloads
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: inputs,
            truncate: true,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;

        if !resp.status().is_success() {
            let err = HttpError::from_response(&self.url_embed, resp).await;
            return Err(ProviderError::HttpStatus(err).into());
        }

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::Decode(format!(
                "serde error: {e}; expected `{{ embeddings: number[][] }}`"
            ))
        })?;

        if out.embeddings.len() != inputs.len() {
            return Err(ProviderError::CountMismatch {
                expected: inputs.len(),
                got: out.embeddings.len(),
            }
            .into());
        }
        Ok(out.embeddings)
    }
}

/* ==========================
HTTP payloads
========================== */

/// Request body for `/api/embed`.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

/// Response body for `/api/embed`.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_provider() {
        let cfg = ModelConfig {
            provider: ModelProvider::Tei,
            model: String::new(),
            endpoint: "http://localhost:8080".into(),
            api_key: None,
            timeout_secs: None,
        };
        assert!(OllamaService::new(cfg).is_err());
    }

    #[test]
    fn request_shape_is_batched() {
        let input = vec!["a".to_string(), "b".to_string()];
        let body = EmbedRequest {
            model: "bge-m3",
            input: &input,
            truncate: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
        assert_eq!(json["model"], "bge-m3");
    }
}
