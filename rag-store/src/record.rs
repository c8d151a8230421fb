//! Core data models used by the library.
//!
//! Indexing side: [`SourceDocument`] → [`Chunk`] → [`EmbeddingRecord`] → [`IndexedChunk`].
//! Query side: [`StoreHit`] → [`RetrievalHit`] → [`FusedCandidate`] → [`RankedResult`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{FailureClass, RagError};

/* ---------------------------- Indexing side ---------------------------- */

/// A document as fetched from its source, immutable for one indexing pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable document identifier (usually the canonical path or URL).
    pub id: String,
    /// Path or URL the text was read from.
    pub url: String,
    pub raw_text: String,
    /// Product the page belongs to; used for filtering.
    pub product_tag: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Opaque passthrough fields; never inspected by the pipeline.
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

/// Position of a chunk inside its document.
///
/// Ordered by `(document_id, index)`; rendered as `"{document_id}#{index}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: String,
    pub index: u32,
}

impl ChunkId {
    pub fn new(document_id: impl Into<String>, index: u32) -> Self {
        Self {
            document_id: document_id.into(),
            index,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.index)
    }
}

/// Dominant content of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Code,
    Mixed,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "code" => Self::Code,
            "mixed" => Self::Mixed,
            _ => Self::Text,
        }
    }
}

/// A bounded slice of a document: trailing overlap from the previous chunk
/// followed by this chunk's own body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: ChunkId,
    /// Overlap prefix + body.
    pub text: String,
    /// Byte length of the overlap prefix inside `text`.
    pub overlap_bytes: usize,
    /// Tokens in `text` (overlap included); never above `max_tokens`.
    pub token_count: usize,
    pub section_title: Option<String>,
    pub section_level: Option<u8>,
    pub has_code: bool,
    /// True when this chunk continues a block that was split mid-way.
    pub is_continuation: bool,
    pub content_type: ContentType,
    /// BLAKE3 hex of the normalized body.
    pub fingerprint: String,
}

impl Chunk {
    /// The chunk's own text without the overlap prefix.
    pub fn body(&self) -> &str {
        &self.text[self.overlap_bytes..]
    }

    /// The overlap prefix copied from the previous chunk.
    pub fn overlap(&self) -> &str {
        &self.text[..self.overlap_bytes]
    }
}

/// A validated vector for one chunk.
///
/// Only constructible through [`EmbeddingRecord::new`], which enforces the
/// collection dimensionality.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
    chunk_id: ChunkId,
    vector: Vec<f32>,
    embedding_model: String,
    embedded_at: DateTime<Utc>,
    fingerprint: String,
}

impl EmbeddingRecord {
    /// # Errors
    /// [`RagError::VectorSizeMismatch`] when `vector.len() != expected_dim`.
    pub fn new(
        chunk_id: ChunkId,
        vector: Vec<f32>,
        expected_dim: usize,
        embedding_model: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Result<Self, RagError> {
        if vector.len() != expected_dim {
            return Err(RagError::VectorSizeMismatch {
                got: vector.len(),
                want: expected_dim,
            });
        }
        Ok(Self {
            chunk_id,
            vector,
            embedding_model: embedding_model.into(),
            embedded_at: Utc::now(),
            fingerprint: fingerprint.into(),
        })
    }

    pub fn chunk_id(&self) -> &ChunkId {
        &self.chunk_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn embedded_at(&self) -> DateTime<Utc> {
        self.embedded_at
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

/// Prior state of a stored chunk, as returned by `SearchStore::get`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub chunk_id: ChunkId,
    pub fingerprint: String,
    pub embedding_model: Option<String>,
    pub embedded_at: Option<DateTime<Utc>>,
}

/// Closed metadata schema carried by every stored chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub document_id: String,
    pub url: String,
    pub product_tag: String,
    pub version: Option<String>,
    pub title: Option<String>,
    pub section_title: Option<String>,
    pub section_level: Option<u8>,
    pub content_type: ContentType,
    pub has_code: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceMetadata {
    pub fn from_chunk(doc: &SourceDocument, chunk: &Chunk) -> Self {
        Self {
            document_id: doc.id.clone(),
            url: doc.url.clone(),
            product_tag: doc.product_tag.clone(),
            version: doc.version.clone(),
            title: doc.title.clone(),
            section_title: chunk.section_title.clone(),
            section_level: chunk.section_level,
            content_type: chunk.content_type,
            has_code: chunk.has_code,
            extra: doc.extra.clone(),
        }
    }
}

/// The persisted unit: vector + text + metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedChunk {
    pub record: EmbeddingRecord,
    pub text: String,
    pub token_count: usize,
    pub is_continuation: bool,
    pub metadata: SourceMetadata,
}

impl IndexedChunk {
    pub fn new(doc: &SourceDocument, chunk: &Chunk, record: EmbeddingRecord) -> Self {
        Self {
            metadata: SourceMetadata::from_chunk(doc, chunk),
            text: chunk.text.clone(),
            token_count: chunk.token_count,
            is_continuation: chunk.is_continuation,
            record,
        }
    }

    pub fn chunk_id(&self) -> &ChunkId {
        self.record.chunk_id()
    }
}

/// One chunk that could not be indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub chunk_id: ChunkId,
    pub reason: String,
    pub class: FailureClass,
}

/// Outcome of an indexing run. Always returned, even when items failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: Vec<FailedItem>,
}

/* ------------------------------ Query side ------------------------------ */

/// Which retrieval branch produced a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSource {
    Vector,
    Keyword,
}

/// A hit as returned by the store, before ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub text: String,
    pub metadata: SourceMetadata,
    pub vector: Option<Vec<f32>>,
}

/// A ranked hit from one branch; `rank` is 1-based.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub chunk_id: ChunkId,
    pub raw_score: f32,
    pub rank: usize,
    pub source: HitSource,
}

/// Per-branch ranks that contributed to a fused score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContributingRanks {
    pub vector: Option<usize>,
    pub keyword: Option<usize>,
}

impl ContributingRanks {
    pub(crate) fn set(&mut self, source: HitSource, rank: usize) {
        let slot = match source {
            HitSource::Vector => &mut self.vector,
            HitSource::Keyword => &mut self.keyword,
        };
        if slot.is_none() {
            *slot = Some(rank);
        }
    }
}

/// Output of rank fusion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FusedCandidate {
    pub chunk_id: ChunkId,
    pub fusion_score: f64,
    pub contributing_ranks: ContributingRanks,
}

/// Final result row returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub document_id: String,
    /// Rerank score when reranking was applied, fusion score otherwise.
    pub score: f64,
    pub text: String,
    pub metadata: SourceMetadata,
    pub fusion_score: f64,
    pub rerank_score: Option<f32>,
}

/// Query result; `degraded` names the branch that failed, if any.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<RankedResult>,
    pub degraded: Option<HitSource>,
    pub reranked: bool,
}

/// Metadata filter applied to both retrieval branches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RagFilter {
    #[serde(default)]
    pub product_tag: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Exact match on arbitrary payload fields, e.g. `("extra.locale", "en")`.
    #[serde(default)]
    pub equals: Vec<(String, Value)>,
}

impl RagFilter {
    pub fn is_empty(&self) -> bool {
        self.product_tag.is_none() && self.version.is_none() && self.equals.is_empty()
    }
}
