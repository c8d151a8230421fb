//! Dual retrieval: vector and keyword search run concurrently, each under its
//! own deadline. One failing branch degrades the query; both failing fails it.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::RetrievalConfig;
use crate::errors::{ProviderError, RagError};
use crate::fusion::to_ranked;
use crate::provider::{EmbeddingsProvider, SearchStore};
use crate::record::{ChunkId, HitSource, RagFilter, RetrievalHit, StoreHit};

/// Output of [`DualRetriever::retrieve`].
#[derive(Debug, Default)]
pub struct DualRetrieval {
    /// One ranked list per branch that succeeded.
    pub lists: Vec<Vec<RetrievalHit>>,
    /// Every hit of every list, by id; first branch to report a chunk wins,
    /// except that a stored vector is always kept.
    pub candidates: HashMap<ChunkId, StoreHit>,
    /// The branch that failed, if one did.
    pub degraded: Option<HitSource>,
}

/// Borrowing view over the capabilities needed for retrieval.
pub struct DualRetriever<'a> {
    store: &'a dyn SearchStore,
    embedder: &'a dyn EmbeddingsProvider,
    cfg: &'a RetrievalConfig,
}

impl<'a> DualRetriever<'a> {
    pub fn new(
        store: &'a dyn SearchStore,
        embedder: &'a dyn EmbeddingsProvider,
        cfg: &'a RetrievalConfig,
    ) -> Self {
        Self { store, embedder, cfg }
    }

    /// Per-branch candidate count: `ceil(limit × over_fetch)` kept within
    /// `[limit, candidate_cap]`; the cap wins when `limit` exceeds it.
    pub fn fetch_size(&self, limit: usize) -> usize {
        let raw = (limit as f64 * f64::from(self.cfg.over_fetch)).ceil() as usize;
        raw.max(limit).min(self.cfg.candidate_cap)
    }

    /// Runs both branches for `query`.
    ///
    /// # Errors
    /// [`RagError::Retrieval`] when both branches fail.
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&RagFilter>,
    ) -> Result<DualRetrieval, RagError> {
        let fetch = self.fetch_size(limit);
        trace!("retrieve::retrieve limit={limit} fetch={fetch} filter={}", filter.is_some());

        let vector_branch = async {
            let qv = self.embedder.embed(query).await?;
            self.store.vector_search(&qv, fetch, filter).await
        };
        let keyword_branch = self.store.keyword_search(query, fetch, filter);

        let (vector, keyword) = tokio::join!(
            deadline(self.cfg.vector_timeout, vector_branch),
            deadline(self.cfg.keyword_timeout, keyword_branch),
        );

        let mut out = DualRetrieval::default();
        match (vector, keyword) {
            (Err(v), Err(k)) => {
                warn!("retrieve::retrieve both branches failed: vector={v} keyword={k}");
                return Err(RagError::Retrieval {
                    vector: v.to_string(),
                    keyword: k.to_string(),
                });
            }
            (Ok(v), Ok(k)) => {
                out.push(v, HitSource::Vector);
                out.push(k, HitSource::Keyword);
            }
            (Ok(v), Err(k)) => {
                warn!("retrieve::retrieve keyword branch failed, degraded: {k}");
                out.push(v, HitSource::Vector);
                out.degraded = Some(HitSource::Keyword);
            }
            (Err(v), Ok(k)) => {
                warn!("retrieve::retrieve vector branch failed, degraded: {v}");
                out.push(k, HitSource::Keyword);
                out.degraded = Some(HitSource::Vector);
            }
        }

        debug!(
            "retrieve::retrieve lists={} candidates={} degraded={:?}",
            out.lists.len(),
            out.candidates.len(),
            out.degraded
        );
        Ok(out)
    }
}

impl DualRetrieval {
    fn push(&mut self, hits: Vec<StoreHit>, source: HitSource) {
        self.lists.push(to_ranked(&hits, source));
        for hit in hits {
            match self.candidates.get_mut(&hit.chunk_id) {
                Some(existing) => {
                    if existing.vector.is_none() {
                        existing.vector = hit.vector;
                    }
                }
                None => {
                    self.candidates.insert(hit.chunk_id.clone(), hit);
                }
            }
        }
    }

    /// Stored vectors of all candidates that carry one.
    pub fn vectors(&self) -> HashMap<ChunkId, Vec<f32>> {
        self.candidates
            .iter()
            .filter_map(|(id, h)| h.vector.clone().map(|v| (id.clone(), v)))
            .collect()
    }
}

async fn deadline<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use crate::record::{ContentType, IndexedChunk, SourceMetadata, StoredRecord};
    use std::collections::BTreeMap;

    struct Emb;

    impl EmbeddingsProvider for Emb {
        fn embed_batch<'a>(
            &'a self,
            texts: &'a [String],
        ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
            Box::pin(async move { Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect()) })
        }

        fn model(&self) -> &str {
            "emb"
        }
    }

    #[derive(Clone, Copy)]
    enum Branch {
        Ok,
        Fail,
        Hang,
    }

    struct Store {
        vector: Branch,
        keyword: Branch,
    }

    fn hit(doc: &str, with_vector: bool) -> StoreHit {
        StoreHit {
            chunk_id: ChunkId::new(doc, 0),
            score: 1.0,
            text: format!("text of {doc}"),
            metadata: SourceMetadata {
                document_id: doc.into(),
                url: format!("https://docs.example/{doc}"),
                product_tag: "p".into(),
                version: None,
                title: None,
                section_title: None,
                section_level: None,
                content_type: ContentType::Text,
                has_code: false,
                extra: BTreeMap::new(),
            },
            vector: with_vector.then(|| vec![1.0, 0.0]),
        }
    }

    async fn run(branch: Branch, hits: Vec<StoreHit>) -> Result<Vec<StoreHit>, ProviderError> {
        match branch {
            Branch::Ok => Ok(hits),
            Branch::Fail => Err(ProviderError::Connection("down".into())),
            Branch::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(hits)
            }
        }
    }

    impl SearchStore for Store {
        fn vector_search<'a>(
            &'a self,
            _vector: &'a [f32],
            fetch: usize,
            _filter: Option<&'a RagFilter>,
        ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
            assert_eq!(fetch, 20);
            Box::pin(run(self.vector, vec![hit("a", true), hit("b", true)]))
        }

        fn keyword_search<'a>(
            &'a self,
            _text: &'a str,
            _fetch: usize,
            _filter: Option<&'a RagFilter>,
        ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
            Box::pin(run(self.keyword, vec![hit("b", false), hit("c", false)]))
        }

        fn upsert<'a>(&'a self, _: Vec<IndexedChunk>) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async { Ok(()) })
        }

        fn delete<'a>(&'a self, _: &'a [ChunkId]) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async { Ok(()) })
        }

        fn get<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Vec<StoredRecord>, ProviderError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn ensure_ready(&self, _: usize) -> BoxFuture<'_, Result<(), ProviderError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn cfg() -> RetrievalConfig {
        RetrievalConfig {
            over_fetch: 4.0,
            candidate_cap: 200,
            vector_timeout: Duration::from_millis(500),
            keyword_timeout: Duration::from_millis(500),
            default_top_k: 5,
        }
    }

    #[test]
    fn fetch_size_is_clamped() {
        let mut c = cfg();
        let (s, e) = (Store { vector: Branch::Ok, keyword: Branch::Ok }, Emb);
        assert_eq!(DualRetriever::new(&s, &e, &c).fetch_size(5), 20);
        c.candidate_cap = 12;
        assert_eq!(DualRetriever::new(&s, &e, &c).fetch_size(5), 12);
        c.over_fetch = 1.0;
        assert_eq!(DualRetriever::new(&s, &e, &c).fetch_size(5), 5);
    }

    #[tokio::test]
    async fn both_branches_merge_candidates() {
        let (s, e, c) = (Store { vector: Branch::Ok, keyword: Branch::Ok }, Emb, cfg());
        let out = DualRetriever::new(&s, &e, &c).retrieve("q", 5, None).await.unwrap();
        assert_eq!(out.lists.len(), 2);
        assert_eq!(out.candidates.len(), 3);
        assert!(out.degraded.is_none());
        assert_eq!(out.vectors().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keyword_timeout_degrades() {
        let (s, e, c) = (Store { vector: Branch::Ok, keyword: Branch::Hang }, Emb, cfg());
        let out = DualRetriever::new(&s, &e, &c).retrieve("q", 5, None).await.unwrap();
        assert_eq!(out.degraded, Some(HitSource::Keyword));
        assert_eq!(out.lists.len(), 1);
        assert_eq!(out.lists[0][0].source, HitSource::Vector);
    }

    #[tokio::test]
    async fn both_failing_is_an_error() {
        let (s, e, c) = (Store { vector: Branch::Fail, keyword: Branch::Fail }, Emb, cfg());
        let err = DualRetriever::new(&s, &e, &c).retrieve("q", 5, None).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval { .. }));
    }
}
