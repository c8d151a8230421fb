//! Embedding and rerank capabilities backed by [`ModelServiceProfiles`].

use std::sync::Arc;

use model_service::ModelServiceProfiles;
use tracing::trace;

use super::map_service_error;
use crate::errors::ProviderError;
use crate::provider::{BoxFuture, EmbeddingsProvider, RerankProvider};

/// Embedding provider over the service's embedding profile.
#[derive(Clone)]
pub struct ModelEmbedder {
    svc: Arc<ModelServiceProfiles>,
    model: String,
}

impl ModelEmbedder {
    pub fn new(svc: Arc<ModelServiceProfiles>) -> Self {
        let model = svc.profiles().0.model.clone();
        Self { svc, model }
    }
}

impl EmbeddingsProvider for ModelEmbedder {
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
        Box::pin(async move {
            trace!("ModelEmbedder::embed_batch size={}", texts.len());
            self.svc.embed_batch(texts).await.map_err(map_service_error)
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Rerank provider over the service's rerank profile.
#[derive(Clone)]
pub struct ModelReranker {
    svc: Arc<ModelServiceProfiles>,
}

impl ModelReranker {
    /// `None` when the service has no rerank profile configured.
    pub fn new(svc: Arc<ModelServiceProfiles>) -> Option<Self> {
        svc.has_rerank().then_some(Self { svc })
    }
}

impl RerankProvider for ModelReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, ProviderError>> {
        Box::pin(async move {
            trace!("ModelReranker::rerank candidates={}", candidates.len());
            let scores = self
                .svc
                .rerank(query, candidates)
                .await
                .map_err(map_service_error)?;
            Ok(scores.into_iter().map(|s| (s.index, s.score)).collect())
        })
    }
}
