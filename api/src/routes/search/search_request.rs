use rag_store::{RagFilter, SearchRequest};
use serde::Deserialize;

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub product_tag: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// `false` skips the reranker for this query.
    #[serde(default)]
    pub rerank: Option<bool>,
}

impl From<SearchBody> for SearchRequest {
    fn from(b: SearchBody) -> Self {
        let filter = RagFilter {
            product_tag: b.product_tag,
            version: b.version,
            equals: Vec::new(),
        };
        SearchRequest {
            query: b.query,
            limit: b.limit,
            filter: (!filter.is_empty()).then_some(filter),
            rerank: b.rerank,
        }
    }
}
