//! Capability traits the pipeline is built against.
//!
//! Implement these to plug in your own embedding backend, reranker or store.
//! All methods return boxed futures so the traits stay object safe and can be
//! shared as `Arc<dyn …>`.

use std::{future::Future, pin::Pin};

use crate::errors::ProviderError;
use crate::record::{ChunkId, IndexedChunk, RagFilter, StoreHit, StoredRecord};

/// Boxed future returned by every capability call.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Batched embedding generation.
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds `texts`; the output has one vector per input, in input order.
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>>;

    /// Embeds a single text (the query path).
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ProviderError>> {
        Box::pin(async move {
            let input = [text.to_string()];
            let mut out = self.embed_batch(&input).await?;
            match (out.pop(), out.is_empty()) {
                (Some(v), true) => Ok(v),
                _ => Err(ProviderError::Decode(
                    "expected exactly one vector for one input".into(),
                )),
            }
        })
    }

    /// Model identifier stamped on every `EmbeddingRecord`.
    fn model(&self) -> &str;
}

/// Cross-encoder reranking of a fixed candidate set.
pub trait RerankProvider: Send + Sync {
    /// Returns `(index into candidates, score)` pairs; higher scores are better.
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, ProviderError>>;
}

/// Vector + lexical search and persistence of indexed chunks.
pub trait SearchStore: Send + Sync {
    /// Nearest neighbours of `vector`, best first.
    fn vector_search<'a>(
        &'a self,
        vector: &'a [f32],
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>>;

    /// Lexical matches for `text`, best first.
    fn keyword_search<'a>(
        &'a self,
        text: &'a str,
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>>;

    /// Inserts or replaces chunks by id.
    fn upsert<'a>(&'a self, chunks: Vec<IndexedChunk>) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Removes chunks by id; unknown ids are ignored.
    fn delete<'a>(&'a self, ids: &'a [ChunkId]) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Prior state of every stored chunk of a document.
    fn get<'a>(
        &'a self,
        document_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StoredRecord>, ProviderError>>;

    /// Creates the collection/indexes if needed and checks the vector size.
    fn ensure_ready(&self, dim: usize) -> BoxFuture<'_, Result<(), ProviderError>>;
}
