//! Model service shared by the indexing and search pipelines.
//!
//! Two logical profiles live here:
//! - **embedding**: text → dense vectors (Ollama `/api/embed` or OpenAI-compatible `/v1/embeddings`)
//! - **rerank** (optional): query + candidate texts → relevance scores (Cohere-style or TEI `/rerank`)
//!
//! Construct [`service_profiles::ModelServiceProfiles`] once, wrap it in `Arc`
//! and hand clones to dependents. Health checks for every configured profile are
//! exposed through [`service_profiles::ModelServiceProfiles::health_all`].

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::model_config::ModelConfig;
pub use config::model_provider::ModelProvider;
pub use error_handler::{ModelServiceError, Result};
pub use service_profiles::ModelServiceProfiles;
