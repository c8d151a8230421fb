use rag_store::{IndexOptions, SourceDocument};
use serde::Deserialize;

/// Body of `POST /index`.
#[derive(Debug, Deserialize)]
pub struct IndexBody {
    pub documents: Vec<SourceDocument>,
    #[serde(default)]
    pub force_reembed: bool,
}

impl IndexBody {
    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            force_reembed: self.force_reembed,
            show_progress: false,
        }
    }
}
