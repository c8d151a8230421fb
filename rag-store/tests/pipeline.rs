//! End-to-end tests of the `RagStore` facade over in-memory capabilities.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::AbortHandle;
use rag_store::lexical::{query_terms, term_frequency_score};
use rag_store::record::{HitSource, IndexedChunk, StoreHit, StoredRecord};
use rag_store::select::cosine;
use rag_store::{
    BoxFuture, ChunkId, EmbeddingsProvider, IndexOptions, ProviderError, RagConfig, RagError,
    RagFilter, RagStore, RerankProvider, SearchRequest, SearchStore, SourceDocument,
};

const DIM: usize = 16;

/* ------------------------------ fakes ------------------------------ */

/// Hashed bag-of-words vectors: texts sharing words point the same way.
#[derive(Default)]
struct FakeEmbedder {
    texts_embedded: AtomicUsize,
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIM] += 1.0;
    }
    v
}

impl EmbeddingsProvider for FakeEmbedder {
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
        Box::pin(async move {
            self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| bag_of_words(t)).collect())
        })
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }
}

#[derive(Default)]
struct FakeStore {
    points: Mutex<BTreeMap<ChunkId, IndexedChunk>>,
    keyword_down: AtomicBool,
    unready: AtomicBool,
}

impl FakeStore {
    fn matching(&self, filter: Option<&RagFilter>) -> Vec<IndexedChunk> {
        let points = self.points.lock().unwrap();
        points
            .values()
            .filter(|c| match filter.and_then(|f| f.product_tag.as_ref()) {
                Some(tag) => &c.metadata.product_tag == tag,
                None => true,
            })
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }
}

fn to_hit(c: IndexedChunk, score: f32) -> StoreHit {
    StoreHit {
        chunk_id: c.chunk_id().clone(),
        score,
        text: c.text.clone(),
        metadata: c.metadata.clone(),
        vector: Some(c.record.vector().to_vec()),
    }
}

fn top(mut hits: Vec<StoreHit>, fetch: usize) -> Vec<StoreHit> {
    hits.retain(|h| h.score > 0.0);
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    hits.truncate(fetch);
    hits
}

impl SearchStore for FakeStore {
    fn vector_search<'a>(
        &'a self,
        vector: &'a [f32],
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
        Box::pin(async move {
            let hits = self
                .matching(filter)
                .into_iter()
                .map(|c| {
                    let s = cosine(vector, c.record.vector());
                    to_hit(c, s)
                })
                .collect();
            Ok(top(hits, fetch))
        })
    }

    fn keyword_search<'a>(
        &'a self,
        text: &'a str,
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
        Box::pin(async move {
            if self.keyword_down.load(Ordering::SeqCst) {
                return Err(ProviderError::Connection("keyword index offline".into()));
            }
            let terms = query_terms(text);
            let hits = self
                .matching(filter)
                .into_iter()
                .map(|c| {
                    let s = term_frequency_score(&terms, &c.text);
                    to_hit(c, s)
                })
                .collect();
            Ok(top(hits, fetch))
        })
    }

    fn upsert<'a>(&'a self, chunks: Vec<IndexedChunk>) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let mut points = self.points.lock().unwrap();
            for c in chunks {
                points.insert(c.chunk_id().clone(), c);
            }
            Ok(())
        })
    }

    fn delete<'a>(&'a self, ids: &'a [ChunkId]) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let mut points = self.points.lock().unwrap();
            for id in ids {
                points.remove(id);
            }
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        document_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StoredRecord>, ProviderError>> {
        Box::pin(async move {
            let points = self.points.lock().unwrap();
            Ok(points
                .values()
                .filter(|c| c.chunk_id().document_id == document_id)
                .map(|c| StoredRecord {
                    chunk_id: c.chunk_id().clone(),
                    fingerprint: c.record.fingerprint().to_string(),
                    embedding_model: Some(c.record.embedding_model().to_string()),
                    embedded_at: Some(c.record.embedded_at()),
                })
                .collect())
        })
    }

    fn ensure_ready(&self, _dim: usize) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(async move {
            if self.unready.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable("collection cannot be created".into()));
            }
            Ok(())
        })
    }
}

enum RerankMode {
    /// Scores candidates in reverse of the order received.
    Reverse,
    /// Never answers.
    Hang,
}

struct FakeReranker(RerankMode);

impl RerankProvider for FakeReranker {
    fn rerank<'a>(
        &'a self,
        _query: &'a str,
        candidates: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, ProviderError>> {
        Box::pin(async move {
            match self.0 {
                RerankMode::Reverse => Ok((0..candidates.len()).map(|i| (i, i as f32)).collect()),
                RerankMode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        })
    }
}

/* ------------------------------ fixtures ------------------------------ */

fn config() -> RagConfig {
    let mut cfg = RagConfig::new_default("http://localhost:6334", "docs_test", DIM);
    cfg.embedding.min_request_interval = Duration::ZERO;
    cfg.ranking.rerank_timeout = Duration::from_millis(200);
    cfg
}

fn doc(id: &str, product: &str, text: &str) -> SourceDocument {
    SourceDocument {
        id: id.into(),
        url: format!("https://docs.example/{id}"),
        raw_text: text.into(),
        product_tag: product.into(),
        version: Some("1.0".into()),
        title: None,
        last_modified: None,
        extra: BTreeMap::new(),
    }
}

fn corpus() -> Vec<SourceDocument> {
    vec![
        doc(
            "cli/proxy",
            "cli",
            "# Proxy\n\nSet the proxy timeout with `--proxy-timeout`. The proxy timeout is in seconds.\n",
        ),
        doc(
            "cli/install",
            "cli",
            "# Install\n\nDownload the installer and run it. Installation needs admin rights.\n",
        ),
        doc(
            "server/logging",
            "server",
            "# Logging\n\nServer logs rotate daily. Configure rotation in the logging section.\n",
        ),
    ]
}

async fn open(
    store: Arc<FakeStore>,
    embedder: Arc<FakeEmbedder>,
    reranker: Option<Arc<dyn RerankProvider>>,
) -> RagStore {
    RagStore::open(config(), store, embedder, reranker).await.unwrap()
}

/* ------------------------------ tests ------------------------------ */

#[tokio::test]
async fn index_then_search() {
    let store = Arc::new(FakeStore::default());
    let rag = open(store.clone(), Arc::new(FakeEmbedder::default()), None).await;

    let summary = rag.index_documents(&corpus(), IndexOptions::default()).await.unwrap();
    assert_eq!(summary.documents, 3);
    assert_eq!(summary.embedded, summary.chunks);
    assert!(summary.failed.is_empty());
    assert_eq!(store.len(), summary.chunks);

    let out = rag.search(SearchRequest::new("proxy timeout")).await.unwrap();
    assert!(out.degraded.is_none());
    assert!(!out.reranked);
    assert_eq!(out.results[0].document_id, "cli/proxy");
    assert!(out.results.iter().all(|r| r.rerank_score.is_none()));
    assert_eq!(out.results[0].score, out.results[0].fusion_score);
}

#[tokio::test]
async fn reindex_embeds_only_changes() {
    let store = Arc::new(FakeStore::default());
    let embedder = Arc::new(FakeEmbedder::default());
    let rag = open(store.clone(), embedder.clone(), None).await;

    let mut docs = corpus();
    let first = rag.index_documents(&docs, IndexOptions::default()).await.unwrap();
    let after_first = embedder.texts_embedded.load(Ordering::SeqCst);
    assert_eq!(after_first, first.chunks);

    let again = rag.index_documents(&docs, IndexOptions::default()).await.unwrap();
    assert_eq!(again.embedded, 0);
    assert_eq!(again.unchanged, first.chunks);
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), after_first);

    docs[1].raw_text = "# Install\n\nDownload the installer and run it twice.\n".into();
    let edited = rag.index_documents(&docs, IndexOptions::default()).await.unwrap();
    assert_eq!(edited.embedded, 1);
    assert_eq!(edited.unchanged, first.chunks - 1);

    let forced = rag
        .index_documents(
            &docs,
            IndexOptions {
                force_reembed: true,
                show_progress: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(forced.embedded, forced.chunks);
}

#[tokio::test]
async fn remove_document_drops_its_chunks() {
    let store = Arc::new(FakeStore::default());
    let rag = open(store.clone(), Arc::new(FakeEmbedder::default()), None).await;
    rag.index_documents(&corpus(), IndexOptions::default()).await.unwrap();

    let removed = rag.remove_document("cli/proxy").await.unwrap();
    assert!(removed >= 1);
    assert_eq!(rag.remove_document("cli/proxy").await.unwrap(), 0);

    let out = rag.search(SearchRequest::new("proxy timeout")).await.unwrap();
    assert!(out.results.iter().all(|r| r.document_id != "cli/proxy"));
}

#[tokio::test]
async fn keyword_outage_degrades_to_vector_results() {
    let store = Arc::new(FakeStore::default());
    // Pure relevance, so MMR keeps the fused order.
    let mut cfg = config();
    cfg.ranking.mmr_lambda = 1.0;
    let rag = RagStore::open(cfg, store.clone(), Arc::new(FakeEmbedder::default()), None)
        .await
        .unwrap();
    rag.index_documents(&corpus(), IndexOptions::default()).await.unwrap();

    let query = "proxy install logs rotation";
    let vector_order: Vec<ChunkId> = store
        .vector_search(&bag_of_words(query), 100, None)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.chunk_id)
        .collect();
    assert!(vector_order.len() >= 3);

    store.keyword_down.store(true, Ordering::SeqCst);
    let out = rag.search(SearchRequest::new(query)).await.unwrap();
    assert_eq!(out.degraded, Some(HitSource::Keyword));
    let got: Vec<ChunkId> = out.results.iter().map(|r| r.chunk_id.clone()).collect();
    assert_eq!(got, vector_order);
}

#[tokio::test]
async fn filter_restricts_product() {
    let store = Arc::new(FakeStore::default());
    let rag = open(store, Arc::new(FakeEmbedder::default()), None).await;
    rag.index_documents(&corpus(), IndexOptions::default()).await.unwrap();

    let mut req = SearchRequest::new("configure logging rotation");
    req.filter = Some(RagFilter {
        product_tag: Some("cli".into()),
        ..Default::default()
    });
    let out = rag.search(req).await.unwrap();
    assert!(out.results.iter().all(|r| r.metadata.product_tag == "cli"));
}

#[tokio::test]
async fn reranker_reorders_results() {
    let store = Arc::new(FakeStore::default());
    let embedder = Arc::new(FakeEmbedder::default());
    let plain = open(store.clone(), embedder.clone(), None).await;
    plain.index_documents(&corpus(), IndexOptions::default()).await.unwrap();
    let base = plain.search(SearchRequest::new("proxy install logs")).await.unwrap();

    let reranker: Arc<dyn RerankProvider> = Arc::new(FakeReranker(RerankMode::Reverse));
    let rag = open(store, embedder, Some(reranker)).await;
    let out = rag.search(SearchRequest::new("proxy install logs")).await.unwrap();

    assert!(out.reranked);
    let base_ids: Vec<&ChunkId> = base.results.iter().map(|r| &r.chunk_id).collect();
    let mut got: Vec<&ChunkId> = out.results.iter().map(|r| &r.chunk_id).collect();
    got.reverse();
    assert_eq!(got, base_ids);
    let first = &out.results[0];
    assert_eq!(first.score, f64::from(first.rerank_score.unwrap()));

    let mut skip = SearchRequest::new("proxy install logs");
    skip.rerank = Some(false);
    assert!(!rag.search(skip).await.unwrap().reranked);
}

#[tokio::test(start_paused = true)]
async fn reranker_timeout_keeps_fused_order() {
    let store = Arc::new(FakeStore::default());
    let embedder = Arc::new(FakeEmbedder::default());
    let plain = open(store.clone(), embedder.clone(), None).await;
    plain.index_documents(&corpus(), IndexOptions::default()).await.unwrap();
    let base = plain.search(SearchRequest::new("proxy timeout")).await.unwrap();

    let reranker: Arc<dyn RerankProvider> = Arc::new(FakeReranker(RerankMode::Hang));
    let rag = open(store, embedder, Some(reranker)).await;
    let out = rag.search(SearchRequest::new("proxy timeout")).await.unwrap();

    assert!(!out.reranked);
    assert_eq!(out.results, base.results);
}

#[tokio::test]
async fn invalid_and_cancelled_requests() {
    let rag = open(
        Arc::new(FakeStore::default()),
        Arc::new(FakeEmbedder::default()),
        None,
    )
    .await;

    let err = rag.search(SearchRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidRequest(_)));

    let (handle, reg) = AbortHandle::new_pair();
    handle.abort();
    let err = rag
        .search_abortable(SearchRequest::new("proxy"), reg)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled));

    rag.close();
    let err = rag
        .index_documents(&corpus(), IndexOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Store(_)));
}

#[tokio::test]
async fn unready_store_fails_open_with_provider_error() {
    let store = Arc::new(FakeStore::default());
    store.unready.store(true, Ordering::SeqCst);
    let err = RagStore::open(config(), store, Arc::new(FakeEmbedder::default()), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RagError::Provider(ProviderError::Unavailable(_))));
}
