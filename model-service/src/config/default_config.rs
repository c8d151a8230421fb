//! Default model configs loaded strictly from environment variables.
//!
//! Two roles are supported:
//!
//! - **Embedding** → dense vector generator (required)
//! - **Rerank**    → cross-encoder scoring of candidates (optional)
//!
//! # Environment variables
//!
//! Embedding:
//! - `EMBEDDING_PROVIDER` = `ollama` (default) or `openai`
//! - `EMBEDDING_URL`      = base URL; for Ollama falls back to `OLLAMA_URL` / `OLLAMA_PORT`,
//!   for OpenAI to `https://api.openai.com`
//! - `EMBEDDING_MODEL`    = model name (mandatory)
//! - `EMBEDDING_API_KEY`  = bearer token (mandatory for OpenAI)
//! - `EMBEDDING_TIMEOUT_SECS` = optional client timeout (default 30)
//!
//! Rerank (the whole profile is disabled when `RERANK_URL` is unset):
//! - `RERANK_URL`, `RERANK_PROVIDER` (`tei` default, or `cohere`), `RERANK_MODEL`,
//!   `RERANK_API_KEY`, `RERANK_TIMEOUT_SECS` (default 10)

use crate::{
    config::{model_config::ModelConfig, model_provider::ModelProvider},
    error_handler::{ConfigError, ModelServiceError, Result, env_opt, env_opt_u64, must_env},
};

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `EMBEDDING_URL` if present and non-empty
/// 2. `OLLAMA_URL` if present and non-empty
/// 3. `OLLAMA_PORT` → `http://localhost:{port}`
///
/// # Errors
///
/// - [`ConfigError::MissingVar`] if none are set
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
fn ollama_endpoint() -> Result<String> {
    if let Some(url) = env_opt("EMBEDDING_URL").or_else(|| env_opt("OLLAMA_URL")) {
        return Ok(url);
    }
    if let Some(port) = env_opt("OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(ModelServiceError::Config(ConfigError::MissingVar(
        "EMBEDDING_URL, OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Constructs the **embedding** profile from env.
///
/// # Defaults
/// - `provider = ollama`
/// - `timeout_secs = Some(30)`
///
/// # Errors
/// Missing/invalid variables or a provider that cannot embed.
pub fn config_embedding() -> Result<ModelConfig> {
    let provider: ModelProvider = env_opt("EMBEDDING_PROVIDER")
        .as_deref()
        .unwrap_or("ollama")
        .parse()?;
    if !provider.supports_embeddings() {
        return Err(ConfigError::UnsupportedProvider(format!("{provider} (embedding)")).into());
    }

    let endpoint = match provider {
        ModelProvider::Ollama => ollama_endpoint()?,
        _ => env_opt("EMBEDDING_URL").unwrap_or_else(|| "https://api.openai.com".to_string()),
    };
    let model = must_env("EMBEDDING_MODEL")?;
    let api_key = env_opt("EMBEDDING_API_KEY");
    let timeout_secs = env_opt_u64("EMBEDDING_TIMEOUT_SECS")?.or(Some(30));

    let cfg = ModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        timeout_secs,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Constructs the optional **rerank** profile from env.
///
/// Returns `Ok(None)` when `RERANK_URL` is unset; reranking is then skipped
/// by the search pipeline.
///
/// # Defaults
/// - `provider = tei`
/// - `timeout_secs = Some(10)`
pub fn config_rerank() -> Result<Option<ModelConfig>> {
    let Some(endpoint) = env_opt("RERANK_URL") else {
        return Ok(None);
    };
    let provider: ModelProvider = env_opt("RERANK_PROVIDER")
        .as_deref()
        .unwrap_or("tei")
        .parse()?;
    if !provider.supports_rerank() {
        return Err(ConfigError::UnsupportedProvider(format!("{provider} (rerank)")).into());
    }

    let cfg = ModelConfig {
        provider,
        model: env_opt("RERANK_MODEL").unwrap_or_default(),
        endpoint,
        api_key: env_opt("RERANK_API_KEY"),
        timeout_secs: env_opt_u64("RERANK_TIMEOUT_SECS")?.or(Some(10)),
    };
    cfg.validate()?;
    Ok(Some(cfg))
}
