//! Hybrid retrieval over documentation: incremental indexing and
//! vector + keyword search with rank fusion, diversity selection and an
//! optional cross-encoder rerank.
//!
//! Indexing: [`chunking`] → [`change`] → [`embed_pool`] → [`SearchStore::upsert`].
//! Query: [`retrieve`] → [`fusion`] → [`select`] → [`rerank`].
//!
//! External capabilities (embedder, reranker, store) are injected as
//! `Arc<dyn …>` so the pipeline can run against Qdrant and `model-service`
//! in production and against in-memory fakes in tests.

pub mod change;
pub mod chunking;
pub mod config;
pub mod embed;
pub mod embed_pool;
pub mod errors;
pub mod filters;
pub mod fusion;
pub mod ids;
pub mod ingest;
pub mod lexical;
pub mod mappers;
pub mod normalize;
pub mod provider;
pub mod qdrant_facade;
pub mod record;
pub mod rerank;
pub mod retrieve;
pub mod retry;
pub mod select;
pub mod throttle;
pub mod tokenize;

pub use config::{ChunkingConfig, DistanceKind, EmbedConfig, RagConfig, RankingConfig, RetrievalConfig};
pub use errors::{FailureClass, ProviderError, RagError, Result};
pub use ingest::IndexOptions;
pub use provider::{BoxFuture, EmbeddingsProvider, RerankProvider, SearchStore};
pub use record::{
    Chunk, ChunkId, IndexSummary, RagFilter, RankedResult, SearchOutcome, SourceDocument,
    SourceMetadata,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{AbortRegistration, Abortable};
use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::retrieve::DualRetriever;
use crate::throttle::Throttle;

/// A query against the store.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Result size; the configured default when absent.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filter: Option<RagFilter>,
    /// Set to `false` to skip reranking for this query.
    #[serde(default)]
    pub rerank: Option<bool>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// High-level facade that wires configuration and the injected capabilities.
///
/// This is the single entry point recommended for application code. Construct
/// it once with [`RagStore::open`], share it behind an `Arc` and call
/// [`RagStore::close`] on shutdown.
pub struct RagStore {
    cfg: RagConfig,
    store: Arc<dyn SearchStore>,
    embedder: Arc<dyn EmbeddingsProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
    throttle: Throttle,
    closed: AtomicBool,
}

impl RagStore {
    /// Validates `cfg` and prepares the store for `cfg.embedding_dim`-sized vectors.
    ///
    /// # Errors
    /// [`RagError::Config`] for invalid settings, [`RagError::Provider`] when the
    /// store cannot be prepared.
    pub async fn open(
        cfg: RagConfig,
        store: Arc<dyn SearchStore>,
        embedder: Arc<dyn EmbeddingsProvider>,
        reranker: Option<Arc<dyn RerankProvider>>,
    ) -> Result<Self> {
        cfg.validate()?;
        trace!("RagStore::open collection={}", cfg.collection);

        store.ensure_ready(cfg.embedding_dim).await?;

        let throttle = Throttle::new(cfg.embedding.parallelism, cfg.embedding.min_request_interval);
        info!(
            "RagStore::open collection={} dim={} model={} rerank={}",
            cfg.collection,
            cfg.embedding_dim,
            embedder.model(),
            reranker.is_some()
        );
        Ok(Self {
            cfg,
            store,
            embedder,
            reranker,
            throttle,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    /// Indexes `docs` incrementally; only new or changed chunks are embedded.
    ///
    /// # Errors
    /// Configuration errors only; item failures are listed in the summary.
    pub async fn index_documents(
        &self,
        docs: &[SourceDocument],
        opts: IndexOptions,
    ) -> Result<IndexSummary> {
        self.ensure_open()?;
        ingest::index_documents(
            &self.cfg,
            self.store.as_ref(),
            self.embedder.as_ref(),
            &self.throttle,
            docs,
            opts,
        )
        .await
    }

    /// [`RagStore::index_documents`] that stops when `reg`'s handle is aborted.
    ///
    /// # Errors
    /// [`RagError::Cancelled`] when aborted.
    pub async fn index_abortable(
        &self,
        docs: &[SourceDocument],
        opts: IndexOptions,
        reg: AbortRegistration,
    ) -> Result<IndexSummary> {
        Abortable::new(self.index_documents(docs, opts), reg)
            .await
            .map_err(|_| RagError::Cancelled)?
    }

    /// Removes every chunk of `document_id`; returns the number removed.
    ///
    /// # Errors
    /// [`RagError::Store`] when the store fails.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        self.ensure_open()?;
        ingest::remove_document(self.store.as_ref(), document_id).await
    }

    /// Runs the full query pipeline.
    ///
    /// # Errors
    /// [`RagError::InvalidRequest`] for an empty query and
    /// [`RagError::Retrieval`] when both retrieval branches fail.
    pub async fn search(&self, req: SearchRequest) -> Result<SearchOutcome> {
        self.ensure_open()?;
        let query = req.query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidRequest("query must not be empty".into()));
        }
        let limit = req
            .limit
            .unwrap_or(self.cfg.retrieval.default_top_k)
            .clamp(1, self.cfg.retrieval.candidate_cap);
        let filter = req.filter.as_ref().filter(|f| !f.is_empty());
        trace!("RagStore::search limit={limit} filter={}", filter.is_some());

        let retrieval = DualRetriever::new(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &self.cfg.retrieval,
        )
        .retrieve(query, limit, filter)
        .await?;

        let rk = &self.cfg.ranking;
        let fused = fusion::reciprocal_rank_fusion(&retrieval.lists, rk.rrf_k);
        let selected = select::mmr_select(
            &fused,
            &retrieval.vectors(),
            limit,
            rk.mmr_fetch_k.max(limit),
            rk.mmr_lambda,
        );

        let texts: Vec<String> = selected
            .iter()
            .map(|s| {
                retrieval
                    .candidates
                    .get(&s.candidate.chunk_id)
                    .map(|h| h.text.clone())
                    .unwrap_or_default()
            })
            .collect();
        let reranker = match req.rerank {
            Some(false) => None,
            _ => self.reranker.as_deref(),
        };
        let reranked = rerank::apply_rerank(query, &texts, reranker, rk.rerank_timeout).await;

        let mut results = Vec::with_capacity(selected.len());
        for &i in &reranked.order {
            let sel = &selected[i];
            let Some(hit) = retrieval.candidates.get(&sel.candidate.chunk_id) else {
                continue;
            };
            let rerank_score = reranked.scores[i];
            let fusion_score = sel.candidate.fusion_score;
            results.push(RankedResult {
                chunk_id: sel.candidate.chunk_id.clone(),
                document_id: sel.candidate.chunk_id.document_id.clone(),
                score: match (reranked.applied, rerank_score) {
                    (true, Some(s)) => f64::from(s),
                    _ => fusion_score,
                },
                text: hit.text.clone(),
                metadata: hit.metadata.clone(),
                fusion_score,
                rerank_score,
            });
        }

        debug!(
            "RagStore::search fused={} selected={} returned={} reranked={} degraded={:?}",
            fused.len(),
            selected.len(),
            results.len(),
            reranked.applied,
            retrieval.degraded
        );
        Ok(SearchOutcome {
            query: query.to_string(),
            results,
            degraded: retrieval.degraded,
            reranked: reranked.applied,
        })
    }

    /// [`RagStore::search`] that stops when `reg`'s handle is aborted.
    ///
    /// # Errors
    /// [`RagError::Cancelled`] when aborted.
    pub async fn search_abortable(
        &self,
        req: SearchRequest,
        reg: AbortRegistration,
    ) -> Result<SearchOutcome> {
        Abortable::new(self.search(req), reg)
            .await
            .map_err(|_| RagError::Cancelled)?
    }

    /// Stops accepting work; in-flight embedding waiters are released with an error.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.throttle.close();
            info!("RagStore::close collection={}", self.cfg.collection);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RagError::Store("store is closed".into()));
        }
        Ok(())
    }
}
