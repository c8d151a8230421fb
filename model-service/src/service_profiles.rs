//! Shared model service with two profiles: `embedding` (required) and `rerank` (optional).
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Provider clients are built once, in [`ModelServiceProfiles::new`].
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use model_service::ModelServiceProfiles;
//! use model_service::config::default_config::{config_embedding, config_rerank};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svc = Arc::new(ModelServiceProfiles::new(config_embedding()?, config_rerank()?, Some(5))?);
//!
//! let vecs = svc.embed_batch(&["Ferris".to_string()]).await?;
//! println!("dim = {}", vecs[0].len());
//!
//! let statuses = svc.health_all().await;
//! println!("health = {statuses:?}");
//! # Ok(()) }
//! ```

use tracing::info;

use crate::{
    config::{model_config::ModelConfig, model_provider::ModelProvider},
    error_handler::{ConfigError, Result},
    health_service::{HealthService, HealthStatus},
    services::{
        ollama_service::OllamaService,
        open_ai_service::OpenAiService,
        rerank_service::{RerankScore, RerankService},
    },
};

/// Shared service that owns the embedding and rerank profiles and their clients.
pub struct ModelServiceProfiles {
    embedding: ModelConfig,
    rerank: Option<ModelConfig>,

    embedder: Embedder,
    reranker: Option<RerankService>,

    health: HealthService,
}

/// Client of the embedding profile.
enum Embedder {
    Ollama(OllamaService),
    OpenAi(OpenAiService),
}

impl Embedder {
    fn new(cfg: &ModelConfig) -> Result<Self> {
        match cfg.provider {
            ModelProvider::Ollama => Ok(Self::Ollama(OllamaService::new(cfg.clone())?)),
            ModelProvider::OpenAI => Ok(Self::OpenAi(OpenAiService::new(cfg.clone())?)),
            other => Err(ConfigError::UnsupportedProvider(other.to_string()).into()),
        }
    }
}

impl ModelServiceProfiles {
    /// Creates a new service.
    ///
    /// - `embedding`: required embedding profile.
    /// - `rerank`: optional rerank profile; `None` disables reranking.
    /// - `health_timeout_secs`: optional timeout for the health checker.
    ///
    /// # Errors
    /// Invalid profiles or an HTTP client that cannot be built.
    pub fn new(
        embedding: ModelConfig,
        rerank: Option<ModelConfig>,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self> {
        if !embedding.provider.supports_embeddings() {
            return Err(ConfigError::UnsupportedProvider(embedding.provider.to_string()).into());
        }
        let embedder = Embedder::new(&embedding)?;
        let reranker = match &rerank {
            Some(r) if !r.provider.supports_rerank() => {
                return Err(ConfigError::UnsupportedProvider(r.provider.to_string()).into());
            }
            Some(r) => Some(RerankService::new(r.clone())?),
            None => None,
        };

        info!(
            embedding_provider = %embedding.provider,
            embedding_model = %embedding.model,
            rerank = rerank.is_some(),
            "model_service::profiles initialized"
        );

        Ok(Self {
            embedding,
            rerank,
            embedder,
            reranker,
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Embeds a batch with the **embedding** profile; one vector per input, in order.
    ///
    /// # Errors
    /// Returns [`crate::ModelServiceError`] if the request fails.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.embedder {
            Embedder::Ollama(cli) => cli.embed_batch(inputs).await,
            Embedder::OpenAi(cli) => cli.embed_batch(inputs).await,
        }
    }

    /// Scores `documents` for `query` with the **rerank** profile.
    ///
    /// # Errors
    /// [`ConfigError::MissingVar`] when no rerank profile is configured, or
    /// any request failure.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankScore>> {
        let cli = self
            .reranker
            .as_ref()
            .ok_or(ConfigError::MissingVar("RERANK_URL"))?;
        cli.rerank(query, documents).await
    }

    /// True when a rerank profile is configured.
    pub fn has_rerank(&self) -> bool {
        self.rerank.is_some()
    }

    /// Returns a health snapshot for all configured profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = Vec::<ModelConfig>::with_capacity(2);
        list.push(self.embedding.clone());
        if let Some(r) = &self.rerank {
            list.push(r.clone());
        }
        self.health.check_many(&list).await
    }

    /// Returns references to the current profiles `(embedding, rerank)`.
    pub fn profiles(&self) -> (&ModelConfig, Option<&ModelConfig>) {
        (&self.embedding, self.rerank.as_ref())
    }
}

impl std::fmt::Debug for ModelServiceProfiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelServiceProfiles")
            .field("embedding", &self.embedding.model)
            .field("rerank", &self.rerank.as_ref().map(|r| r.provider))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::ModelServiceError;

    fn ollama() -> ModelConfig {
        ModelConfig {
            provider: ModelProvider::Ollama,
            model: "bge-m3".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn clients_are_built_up_front() {
        let svc = ModelServiceProfiles::new(ollama(), None, Some(1)).unwrap();
        assert!(matches!(svc.embedder, Embedder::Ollama(_)));
        assert!(svc.reranker.is_none());

        let mut bad = ollama();
        bad.endpoint = "localhost:11434".into();
        assert!(ModelServiceProfiles::new(bad, None, Some(1)).is_err());
    }

    #[tokio::test]
    async fn rerank_without_profile_is_config_error() {
        let svc = ModelServiceProfiles::new(ollama(), None, Some(1)).unwrap();
        assert!(!svc.has_rerank());
        let err = svc.rerank("q", &["d".to_string()]).await.unwrap_err();
        assert!(matches!(err, ModelServiceError::Config(_)));
    }

    #[test]
    fn rejects_rerank_provider_as_embedding() {
        let mut cfg = ollama();
        cfg.provider = ModelProvider::Tei;
        assert!(ModelServiceProfiles::new(cfg, None, None).is_err());
    }
}
