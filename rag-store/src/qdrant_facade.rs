//! [`SearchStore`] over `qdrant-client`.
//!
//! This facade concentrates all Qdrant interactions behind the capability
//! trait, hiding away the verbose builder pattern and keeping the rest of the
//! pipeline decoupled from `qdrant-client`.

use std::collections::HashMap;

use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct, PointsIdsList,
    ScrollPointsBuilder, SearchParamsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QValue, VectorParamsBuilder, VectorsOutput, vectors_config,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use crate::config::{DistanceKind, RagConfig};
use crate::errors::{ProviderError, RagError};
use crate::filters::to_conditions;
use crate::ids::point_id;
use crate::lexical::{ScanPage, query_terms, scan_ranked};
use crate::mappers::{chunk_id_of, metadata_of, stored_record_of, text_of, to_payload};
use crate::provider::{BoxFuture, SearchStore};
use crate::record::{ChunkId, IndexedChunk, RagFilter, StoreHit, StoredRecord};

/// Keyword candidates scanned per requested hit before local ranking.
const KEYWORD_SCAN_FACTOR: usize = 16;
/// Minimum number of keyword candidates scanned, whatever the fetch size.
const KEYWORD_SCAN_FLOOR: usize = 2_048;
/// Page size of every paged scroll.
const SCROLL_PAGE: u32 = 256;

/// A facade over the Qdrant client.
pub struct QdrantFacade {
    client: Qdrant,
    collection: String,
    distance: DistanceKind,
    upsert_batch: usize,
    exact: bool,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// # Errors
    /// [`RagError::Config`] for invalid config or a client that cannot be built.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("qdrant client: {e}")))?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
            upsert_batch: cfg.upsert_batch,
            exact: cfg.exact_search,
        })
    }

    /// Ensures that the collection and its payload indexes exist, and that the
    /// stored vector size matches `dim`.
    async fn ensure_collection(&self, dim: usize) -> Result<(), ProviderError> {
        info!(
            "qdrant_facade::ensure_collection '{}' size={} distance={:?}",
            self.collection, dim, self.distance
        );

        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| unavailable("collection_exists", e))?;

        if exists {
            let info = self
                .client
                .collection_info(&self.collection)
                .await
                .map_err(|e| unavailable("collection_info", e))?;
            let size = info
                .result
                .and_then(|r| r.config)
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config)
                .and_then(|c| match c {
                    vectors_config::Config::Params(p) => Some(p.size as usize),
                    vectors_config::Config::ParamsMap(_) => None,
                });
            if let Some(size) = size {
                if size != dim {
                    return Err(ProviderError::InvalidInput(format!(
                        "collection '{}' has vector size {size}, expected {dim}",
                        self.collection
                    )));
                }
            }
            debug!("qdrant_facade::ensure_collection '{}' exists", self.collection);
        } else {
            let distance = match self.distance {
                DistanceKind::Cosine => Distance::Cosine,
                DistanceKind::Dot => Distance::Dot,
                DistanceKind::Euclid => Distance::Euclid,
            };
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dim as u64, distance)),
                )
                .await
                .map_err(|e| unavailable("create_collection", e))?;
            info!("qdrant_facade::ensure_collection '{}' created", self.collection);
        }

        for (field, kind) in [
            ("document_id", FieldType::Keyword),
            ("product_tag", FieldType::Keyword),
            ("version", FieldType::Keyword),
            ("text", FieldType::Text),
        ] {
            // Creating an existing index is a no-op on the server side.
            if let Err(e) = self
                .client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&self.collection, field, kind).wait(true),
                )
                .await
            {
                warn!("qdrant_facade::ensure_collection index '{field}' failed: {e}");
            }
        }
        Ok(())
    }

    async fn search_vector(
        &self,
        vector: &[f32],
        fetch: usize,
        filter: Option<&RagFilter>,
    ) -> Result<Vec<StoreHit>, ProviderError> {
        trace!("qdrant_facade::search_vector fetch={fetch} exact={}", self.exact);

        let mut builder = SearchPointsBuilder::new(&self.collection, vector.to_vec(), fetch as u64)
            .with_payload(true)
            .with_vectors(true);
        if let Some(f) = filter.and_then(crate::filters::to_qdrant_filter) {
            builder = builder.filter(f);
        }
        if self.exact {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| unavailable("search_points", e))?;

        let hits: Vec<StoreHit> = res
            .result
            .into_iter()
            .filter_map(|p| to_hit(p.payload, p.score, p.vectors))
            .collect();
        debug!("qdrant_facade::search_vector hits={}", hits.len());
        Ok(hits)
    }

    async fn search_keyword(
        &self,
        text: &str,
        fetch: usize,
        filter: Option<&RagFilter>,
    ) -> Result<Vec<StoreHit>, ProviderError> {
        let terms = query_terms(text);
        if terms.is_empty() {
            debug!("qdrant_facade::search_keyword no usable terms");
            return Ok(Vec::new());
        }

        let should: Vec<Condition> = terms
            .iter()
            .map(|t| Condition::matches_text("text", t.clone()))
            .collect();
        let mut qfilter = Filter::should(should);
        if let Some(f) = filter {
            qfilter.must = to_conditions(f);
        }

        let max_scanned = fetch
            .saturating_mul(KEYWORD_SCAN_FACTOR)
            .max(KEYWORD_SCAN_FLOOR);
        trace!(
            "qdrant_facade::search_keyword terms={} fetch={fetch} max_scanned={max_scanned}",
            terms.len()
        );

        let mut hits = scan_ranked(&terms, fetch, max_scanned, |offset: Option<PointId>| {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .filter(qfilter.clone())
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset {
                builder = builder.offset(o);
            }
            async move {
                let res = self
                    .client
                    .scroll(builder)
                    .await
                    .map_err(|e| unavailable("scroll", e))?;
                Ok::<_, ProviderError>(ScanPage {
                    hits: res
                        .result
                        .into_iter()
                        .filter_map(|p| to_hit(p.payload, 0.0, None))
                        .collect(),
                    next: res.next_page_offset,
                })
            }
        })
        .await?;

        self.attach_vectors(&mut hits).await?;
        debug!("qdrant_facade::search_keyword hits={}", hits.len());
        Ok(hits)
    }

    /// Loads stored vectors for the kept keyword hits; the scan itself skips them.
    async fn attach_vectors(&self, hits: &mut [StoreHit]) -> Result<(), ProviderError> {
        if hits.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = hits
            .iter()
            .map(|h| PointId::from(point_id(&h.chunk_id)))
            .collect();
        let res = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, ids)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| unavailable("get_points", e))?;

        let mut vectors: HashMap<ChunkId, Vec<f32>> = res
            .result
            .into_iter()
            .filter_map(|p| {
                let hit = to_hit(p.payload, 0.0, p.vectors)?;
                Some((hit.chunk_id, hit.vector?))
            })
            .collect();
        for h in hits.iter_mut() {
            h.vector = vectors.remove(&h.chunk_id);
        }
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<IndexedChunk>) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            debug!("qdrant_facade::upsert_chunks nothing to upsert");
            return Ok(());
        }
        info!(
            "qdrant_facade::upsert_chunks {} points into '{}'",
            chunks.len(),
            self.collection
        );

        let mut points: Vec<PointStruct> = Vec::with_capacity(chunks.len());
        for c in chunks {
            let payload = Payload::try_from(to_payload(&c))
                .map_err(|e| ProviderError::InvalidInput(format!("payload convert: {e}")))?;
            let id = point_id(c.chunk_id());
            points.push(PointStruct::new(id, c.record.into_vector(), payload));
        }

        let mut rest = points;
        while !rest.is_empty() {
            let tail = rest.split_off(rest.len().min(self.upsert_batch));
            let batch = std::mem::replace(&mut rest, tail);
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, batch).wait(true))
                .await
                .map_err(|e| unavailable("upsert_points", e))?;
        }
        Ok(())
    }

    async fn delete_chunks(&self, ids: &[ChunkId]) -> Result<(), ProviderError> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!("qdrant_facade::delete_chunks count={}", ids.len());
        let ids: Vec<PointId> = ids.iter().map(|id| PointId::from(point_id(id))).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .map_err(|e| unavailable("delete_points", e))?;
        Ok(())
    }

    async fn records_of(&self, document_id: &str) -> Result<Vec<StoredRecord>, ProviderError> {
        let filter = Filter::must([Condition::matches("document_id", document_id.to_string())]);
        let mut out = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .filter(filter.clone())
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let res = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| unavailable("scroll", e))?;

            out.extend(
                res.result
                    .into_iter()
                    .filter_map(|p| stored_record_of(&payload_to_json(p.payload))),
            );
            match res.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        trace!("qdrant_facade::records_of {document_id} records={}", out.len());
        Ok(out)
    }
}

impl SearchStore for QdrantFacade {
    fn vector_search<'a>(
        &'a self,
        vector: &'a [f32],
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
        Box::pin(self.search_vector(vector, fetch, filter))
    }

    fn keyword_search<'a>(
        &'a self,
        text: &'a str,
        fetch: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<StoreHit>, ProviderError>> {
        Box::pin(self.search_keyword(text, fetch, filter))
    }

    fn upsert<'a>(&'a self, chunks: Vec<IndexedChunk>) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(self.upsert_chunks(chunks))
    }

    fn delete<'a>(&'a self, ids: &'a [ChunkId]) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(self.delete_chunks(ids))
    }

    fn get<'a>(
        &'a self,
        document_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<StoredRecord>, ProviderError>> {
        Box::pin(self.records_of(document_id))
    }

    fn ensure_ready(&self, dim: usize) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(self.ensure_collection(dim))
    }
}

/* ------------------------------ helpers ------------------------------ */

fn unavailable(op: &str, e: qdrant_client::QdrantError) -> ProviderError {
    ProviderError::Unavailable(format!("qdrant {op}: {e}"))
}

/// Converts a Qdrant payload into a JSON object.
fn payload_to_json(p: HashMap<String, QValue>) -> Map<String, Value> {
    p.into_iter().map(|(k, v)| (k, v.into_json())).collect()
}

fn to_hit(payload: HashMap<String, QValue>, score: f32, vectors: Option<VectorsOutput>) -> Option<StoreHit> {
    let p = payload_to_json(payload);
    let Some(chunk_id) = chunk_id_of(&p) else {
        warn!("qdrant_facade::to_hit point without chunk identity skipped");
        return None;
    };
    Some(StoreHit {
        chunk_id,
        score,
        text: text_of(&p),
        metadata: metadata_of(&p),
        vector: dense_vector(vectors),
    })
}

#[allow(deprecated)]
fn dense_vector(v: Option<VectorsOutput>) -> Option<Vec<f32>> {
    match v?.vectors_options? {
        VectorsOptions::Vector(out) if !out.data.is_empty() => Some(out.data),
        _ => None,
    }
}
