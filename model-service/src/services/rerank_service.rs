//! Cross-encoder rerank client.
//!
//! Two wire formats are supported:
//! - **TEI**: `POST {endpoint}/rerank` with `{query, texts}` → `[{index, score}]`
//! - **Cohere**: `POST {endpoint}/v1/rerank` with `{model, query, documents}` →
//!   `{results: [{index, relevance_score}]}`
//!
//! The client returns raw `(index, score)` pairs exactly as the upstream sent
//! them; range/duplicate validation happens in the search pipeline.

use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::model_config::ModelConfig;
use crate::config::model_provider::ModelProvider;
use crate::error_handler::{HttpError, ProviderError, Result};
use crate::services::{bearer, build_client};

/// One score returned by the reranker, addressed by position in the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    /// Index into the `documents` slice that was sent.
    pub index: usize,
    /// Relevance score (higher is better).
    pub score: f32,
}

/// Thin client for TEI / Cohere rerank endpoints.
pub struct RerankService {
    client: reqwest::Client,
    cfg: ModelConfig,
    url_rerank: String,
    auth: Option<header::HeaderValue>,
}

impl RerankService {
    /// Creates a new [`RerankService`].
    ///
    /// # Errors
    /// - [`ProviderError::InvalidProvider`] for non-rerank providers
    /// - config errors for invalid endpoints or API keys
    pub fn new(cfg: ModelConfig) -> Result<Self> {
        if !cfg.provider.supports_rerank() {
            return Err(ProviderError::InvalidProvider("rerank").into());
        }
        cfg.validate()?;

        let client = build_client(&cfg, Duration::from_secs(10))?;
        let url_rerank = match cfg.provider {
            ModelProvider::Cohere => format!("{}/v1/rerank", cfg.base_url()),
            _ => format!("{}/rerank", cfg.base_url()),
        };
        let auth = cfg.api_key.as_deref().map(bearer).transpose()?;

        Ok(Self {
            client,
            cfg,
            url_rerank,
            auth,
        })
    }

    /// Scores `documents` against `query`.
    ///
    /// # Errors
    /// HTTP status, transport and decode failures.
    #[instrument(skip_all, fields(provider = %self.cfg.provider, docs = documents.len()))]
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankScore>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!("POST {}", self.url_rerank);
        let mut req = self.client.post(&self.url_rerank);
        if let Some(auth) = &self.auth {
            req = req.header(header::AUTHORIZATION, auth.clone());
        }
        req = match self.cfg.provider {
            ModelProvider::Cohere => req.json(&CohereRequest {
                model: &self.cfg.model,
                query,
                documents,
                return_documents: false,
            }),
            _ => req.json(&TeiRequest {
                query,
                texts: documents,
                raw_scores: false,
            }),
        };

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let err = HttpError::from_response(&self.url_rerank, resp).await;
            return Err(ProviderError::HttpStatus(err).into());
        }

        let body: RerankResponse = resp.json().await.map_err(|e| {
            ProviderError::Decode(format!(
                "serde error: {e}; expected `[{{index, score}}]` or `{{results: [...]}}`"
            ))
        })?;
        Ok(body.into_scores())
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct TeiRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RerankResponse {
    Tei(Vec<TeiItem>),
    Cohere { results: Vec<CohereItem> },
}

#[derive(Debug, Deserialize)]
struct TeiItem {
    index: usize,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct CohereItem {
    index: usize,
    relevance_score: f32,
}

impl RerankResponse {
    fn into_scores(self) -> Vec<RerankScore> {
        match self {
            Self::Tei(items) => items
                .into_iter()
                .map(|i| RerankScore {
                    index: i.index,
                    score: i.score,
                })
                .collect(),
            Self::Cohere { results } => results
                .into_iter()
                .map(|i| RerankScore {
                    index: i.index,
                    score: i.relevance_score,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tei_shape() {
        let raw = r#"[{"index":1,"score":0.9},{"index":0,"score":0.1}]"#;
        let scores = serde_json::from_str::<RerankResponse>(raw)
            .unwrap()
            .into_scores();
        assert_eq!(scores[0], RerankScore { index: 1, score: 0.9 });
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn decodes_cohere_shape() {
        let raw = r#"{"id":"x","results":[{"index":2,"relevance_score":0.5}],"meta":{}}"#;
        let scores = serde_json::from_str::<RerankResponse>(raw)
            .unwrap()
            .into_scores();
        assert_eq!(scores, vec![RerankScore { index: 2, score: 0.5 }]);
    }

    #[test]
    fn cohere_uses_versioned_path() {
        let svc = RerankService::new(ModelConfig {
            provider: ModelProvider::Cohere,
            model: "rerank-v3.5".into(),
            endpoint: "https://api.cohere.com/".into(),
            api_key: Some("k".into()),
            timeout_secs: None,
        })
        .unwrap();
        assert_eq!(svc.url_rerank, "https://api.cohere.com/v1/rerank");
    }
}
