//! Runtime and collection configuration.
//!
//! Everything is read once at startup through [`RagConfig::from_env`]; any invalid
//! value is reported as [`RagError::Config`] before the store is opened.

use std::str::FromStr;
use std::time::Duration;

use crate::errors::RagError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl FromStr for DistanceKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" => Ok(Self::Euclid),
            other => Err(RagError::Config(format!("unknown distance: {other}"))),
        }
    }
}

/// Chunk size limits, in tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    /// Tokens copied from the end of the previous chunk body.
    pub overlap_tokens: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_tokens == 0 {
            return Err(RagError::Config("chunk max_tokens must be > 0".into()));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(RagError::Config(format!(
                "chunk overlap_tokens ({}) must be < max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 384,
            overlap_tokens: 48,
        }
    }
}

/// Batching, throttling and retry settings for the embedding stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedConfig {
    pub max_batch_chunks: usize,
    pub max_batch_tokens: usize,
    /// Process-wide bound on in-flight embedding requests.
    pub parallelism: usize,
    /// Minimum gap between two request starts.
    pub min_request_interval: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            max_batch_chunks: 32,
            max_batch_tokens: 8192,
            parallelism: 4,
            min_request_interval: Duration::from_millis(100),
            request_timeout: Duration::from_millis(30_000),
            max_attempts: 4,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_millis(8_000),
        }
    }
}

/// Dual retrieval settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    /// Multiplier applied to the requested limit for each branch.
    pub over_fetch: f32,
    /// Absolute ceiling on candidates per branch.
    pub candidate_cap: usize,
    pub vector_timeout: Duration,
    pub keyword_timeout: Duration,
    /// Result size when the request does not specify one.
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            over_fetch: 4.0,
            candidate_cap: 200,
            vector_timeout: Duration::from_millis(5_000),
            keyword_timeout: Duration::from_millis(5_000),
            default_top_k: 10,
        }
    }
}

/// Fusion, diversity and rerank settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingConfig {
    pub rrf_k: u32,
    /// 1.0 = pure relevance, 0.0 = pure diversity.
    pub mmr_lambda: f32,
    /// Fused candidates considered by MMR.
    pub mmr_fetch_k: usize,
    pub rerank_timeout: Duration,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            mmr_lambda: 0.7,
            mmr_fetch_k: 50,
            rerank_timeout: Duration::from_millis(3_000),
        }
    }
}

/// Configuration for RAG ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Distance function (Cosine by default).
    pub distance: DistanceKind,
    /// Upsert batch size (typical range: 128..512).
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Expected embedding dimensionality (D).
    pub embedding_dim: usize,
    pub chunking: ChunkingConfig,
    pub embedding: EmbedConfig,
    pub retrieval: RetrievalConfig,
    pub ranking: RankingConfig,
}

impl RagConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(
        url: impl Into<String>,
        collection: impl Into<String>,
        embedding_dim: usize,
    ) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 256,
            exact_search: false,
            embedding_dim,
            chunking: ChunkingConfig::default(),
            embedding: EmbedConfig::default(),
            retrieval: RetrievalConfig::default(),
            ranking: RankingConfig::default(),
        }
    }

    /// Loads the whole configuration from environment variables.
    ///
    /// # Errors
    /// [`RagError::Config`] for malformed numbers or values out of range.
    pub fn from_env() -> Result<Self, RagError> {
        let cfg = Self {
            qdrant_url: env_or("QDRANT_URL", "http://localhost:6334"),
            qdrant_api_key: env_opt("QDRANT_API_KEY"),
            collection: env_or("QDRANT_COLLECTION", "doc_chunks"),
            distance: parse("QDRANT_DISTANCE", DistanceKind::Cosine)?,
            upsert_batch: parse("QDRANT_BATCH_SIZE", 256)?,
            exact_search: parse("RAG_EXACT_SEARCH", false)?,
            embedding_dim: parse("EMBEDDING_DIM", 1024)?,
            chunking: ChunkingConfig {
                max_tokens: parse("CHUNK_MAX_TOKENS", 384)?,
                overlap_tokens: parse("CHUNK_OVERLAP_TOKENS", 48)?,
            },
            embedding: EmbedConfig {
                max_batch_chunks: parse("EMBED_BATCH_MAX_CHUNKS", 32)?,
                max_batch_tokens: parse("EMBED_BATCH_MAX_TOKENS", 8192)?,
                parallelism: parse("EMBED_PARALLELISM", 4)?,
                min_request_interval: millis("EMBED_MIN_INTERVAL_MS", 100)?,
                request_timeout: millis("EMBED_TIMEOUT_MS", 30_000)?,
                max_attempts: parse("EMBED_MAX_ATTEMPTS", 4)?,
                backoff_base: millis("EMBED_BACKOFF_BASE_MS", 500)?,
                backoff_cap: millis("EMBED_BACKOFF_CAP_MS", 8_000)?,
            },
            retrieval: RetrievalConfig {
                over_fetch: parse("RAG_OVER_FETCH", 4.0)?,
                candidate_cap: parse("RAG_CANDIDATE_CAP", 200)?,
                vector_timeout: millis("RAG_VECTOR_TIMEOUT_MS", 5_000)?,
                keyword_timeout: millis("RAG_KEYWORD_TIMEOUT_MS", 5_000)?,
                default_top_k: parse("RAG_TOP_K", 10)?,
            },
            ranking: RankingConfig {
                rrf_k: parse("RRF_K", 60)?,
                mmr_lambda: parse("MMR_LAMBDA", 0.7)?,
                mmr_fetch_k: parse("MMR_FETCH_K", 50)?,
                rerank_timeout: millis("RERANK_TIMEOUT_MS", 3_000)?,
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        if self.embedding_dim == 0 {
            return Err(RagError::Config("embedding_dim must be > 0".into()));
        }
        self.chunking.validate()?;

        let e = &self.embedding;
        if e.max_batch_chunks == 0 || e.max_batch_tokens == 0 || e.parallelism == 0 {
            return Err(RagError::Config(
                "embedding batch sizes and parallelism must be > 0".into(),
            ));
        }
        if e.max_attempts == 0 {
            return Err(RagError::Config("embed max_attempts must be >= 1".into()));
        }

        let r = &self.retrieval;
        if !(r.over_fetch.is_finite() && r.over_fetch >= 1.0) {
            return Err(RagError::Config("over_fetch must be >= 1.0".into()));
        }
        if r.candidate_cap == 0 || r.default_top_k == 0 {
            return Err(RagError::Config(
                "candidate_cap and default_top_k must be > 0".into(),
            ));
        }

        let k = &self.ranking;
        if !(0.0..=1.0).contains(&k.mmr_lambda) {
            return Err(RagError::Config(format!(
                "mmr_lambda must be in [0, 1], got {}",
                k.mmr_lambda
            )));
        }
        if k.mmr_fetch_k == 0 {
            return Err(RagError::Config("mmr_fetch_k must be > 0".into()));
        }
        Ok(())
    }
}

/* ---------------------------- env helpers ---------------------------- */

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn parse<T: FromStr>(key: &str, default: T) -> Result<T, RagError> {
    match env_opt(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| RagError::Config(format!("invalid value for {key}: {v:?}"))),
        None => Ok(default),
    }
}

fn millis(key: &str, default: u64) -> Result<Duration, RagError> {
    parse(key, default).map(Duration::from_millis)
}
