//! OpenAI-compatible embeddings client (`POST {endpoint}/v1/embeddings`).
//!
//! Works with api.openai.com and self-hosted servers that mirror the protocol
//! (vLLM, LocalAI, TEI's OpenAI route). Items in the response are re-ordered
//! by their `index` field before being returned.

use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::model_config::ModelConfig;
use crate::config::model_provider::ModelProvider;
use crate::error_handler::{ConfigError, HttpError, ProviderError, Result};
use crate::services::{bearer, build_client};

/// Thin client for `/v1/embeddings`.
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: ModelConfig,
    url_embeddings: String,
    auth: header::HeaderValue,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`].
    ///
    /// # Errors
    /// - [`ProviderError::InvalidProvider`] if `cfg.provider` is not `OpenAI`
    /// - [`ConfigError::MissingVar`] when no API key is configured
    pub fn new(cfg: ModelConfig) -> Result<Self> {
        if cfg.provider != ModelProvider::OpenAI {
            return Err(ProviderError::InvalidProvider("OpenAI").into());
        }
        cfg.validate()?;
        let key = cfg
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar("EMBEDDING_API_KEY"))?;
        let auth = bearer(key)?;

        let client = build_client(&cfg, Duration::from_secs(60))?;
        let url_embeddings = format!("{}/v1/embeddings", cfg.base_url());

        Ok(Self {
            client,
            cfg,
            url_embeddings,
            auth,
        })
    }

    /// Model identifier used for every request.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Embeds `inputs` in one request.
    ///
    /// # Errors
    /// Same classes as [`crate::services::ollama_service::OllamaService::embed_batch`].
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .header(header::AUTHORIZATION, self.auth.clone())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = HttpError::from_response(&self.url_embeddings, resp).await;
            return Err(ProviderError::HttpStatus(err).into());
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::Decode(format!(
                "serde error: {e}; expected `{{ data: [{{ index, embedding }}] }}`"
            ))
        })?;

        order_by_index(out.data, inputs.len())
    }
}

/// Sorts response items by `index` and checks that every input got exactly one vector.
fn order_by_index(mut data: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(ProviderError::CountMismatch {
            expected,
            got: data.len(),
        }
        .into());
    }
    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(ProviderError::Decode("response indices are not a permutation of inputs".into()).into());
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, v: f32) -> EmbeddingItem {
        EmbeddingItem {
            index,
            embedding: vec![v],
        }
    }

    #[test]
    fn reorders_by_index() {
        let out = order_by_index(vec![item(1, 1.0), item(0, 0.0), item(2, 2.0)], 3).unwrap();
        assert_eq!(out, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn count_and_index_gaps_rejected() {
        assert!(order_by_index(vec![item(0, 0.0)], 2).is_err());
        assert!(order_by_index(vec![item(0, 0.0), item(0, 1.0)], 2).is_err());
    }

    #[test]
    fn requires_api_key() {
        let cfg = ModelConfig {
            provider: ModelProvider::OpenAI,
            model: "text-embedding-3-small".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: None,
            timeout_secs: None,
        };
        assert!(OpenAiService::new(cfg).is_err());
    }
}
