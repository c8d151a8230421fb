use std::sync::Arc;

use model_service::{
    ModelServiceProfiles,
    config::default_config::{config_embedding, config_rerank},
};
use rag_store::{
    EmbeddingsProvider, RagConfig, RagStore, RerankProvider, SearchStore,
    embed::{ModelEmbedder, ModelReranker},
    qdrant_facade::QdrantFacade,
};
use tracing::info;

use crate::error_handler::AppResult;

const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Shared handler state.
pub struct AppState {
    pub rag: Arc<RagStore>,
    pub models: Arc<ModelServiceProfiles>,
}

impl AppState {
    /// Wires model profiles, the Qdrant store and the search facade from env.
    pub async fn from_env() -> AppResult<Self> {
        let rag_cfg = RagConfig::from_env()?;

        let models = Arc::new(ModelServiceProfiles::new(
            config_embedding()?,
            config_rerank()?,
            Some(HEALTH_TIMEOUT_SECS),
        )?);

        let store: Arc<dyn SearchStore> = Arc::new(QdrantFacade::new(&rag_cfg)?);
        let embedder: Arc<dyn EmbeddingsProvider> = Arc::new(ModelEmbedder::new(models.clone()));
        let reranker = ModelReranker::new(models.clone())
            .map(|r| Arc::new(r) as Arc<dyn RerankProvider>);

        let rag = RagStore::open(rag_cfg, store, embedder, reranker).await?;
        info!("api::AppState ready rerank={}", models.has_rerank());

        Ok(Self {
            rag: Arc::new(rag),
            models,
        })
    }
}
