//! Health checks for the configured model backends.
//!
//! Every provider gets one authenticated `GET`; the providers that
//! list their models also get a model-presence check on the response:
//!
//! | provider | path         | model check                  |
//! |----------|--------------|------------------------------|
//! | Ollama   | `/api/tags`  | `models[].name` (`:latest` optional) |
//! | OpenAI   | `/v1/models` | `data[].id`                  |
//! | Cohere   | `/v1/models` | none                         |
//! | TEI      | `/health`    | none                         |
//!
//! [`HealthService::check`] never fails; errors become `ok = false`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::model_config::ModelConfig;
use crate::config::model_provider::ModelProvider;
use crate::error_handler::{HealthError, HttpError, ModelServiceError};

/// Health of one profile, as served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: Option<String>,
    pub ok: bool,
    /// Round trip of the health request; 0 when no request was sent.
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn of(cfg: &ModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.to_string(),
            endpoint: cfg.endpoint.clone(),
            model: Some(cfg.model.clone()).filter(|m| !m.is_empty()),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// Which listing a provider returns, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    OllamaTags,
    OpenAiModels,
}

/// Path and model check used for a provider.
fn health_target(provider: ModelProvider) -> (&'static str, Option<Listing>) {
    match provider {
        ModelProvider::Ollama => ("/api/tags", Some(Listing::OllamaTags)),
        ModelProvider::OpenAI => ("/v1/models", Some(Listing::OpenAiModels)),
        ModelProvider::Cohere => ("/v1/models", None),
        ModelProvider::Tei => ("/health", None),
    }
}

/// Whether `model` appears in a listing body; `None` when the body has an
/// unexpected shape.
fn model_listed(listing: Listing, body: &Value, model: &str) -> Option<bool> {
    let (array, field) = match listing {
        Listing::OllamaTags => ("models", "name"),
        Listing::OpenAiModels => ("data", "id"),
    };
    let names = body.get(array)?.as_array()?;
    Some(names.iter().filter_map(|m| m.get(field)?.as_str()).any(|name| {
        name == model || (listing == Listing::OllamaTags && name.strip_suffix(":latest") == Some(model))
    }))
}

/// Checks model backends with a shared HTTP client.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// # Errors
    /// [`ModelServiceError::HttpTransport`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, ModelServiceError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        debug!(timeout_secs = timeout.as_secs(), "model_service::health initialized");
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Checks one profile.
    pub async fn check(&self, cfg: &ModelConfig) -> HealthStatus {
        let start = Instant::now();
        let status = match self.try_check(cfg).await {
            Ok(status) => status,
            Err(e) => HealthStatus::of(cfg, false, start.elapsed().as_millis(), e.to_string()),
        };
        if status.ok {
            info!(provider = %status.provider, latency_ms = status.latency_ms, "model_service::health ok");
        } else {
            warn!(
                provider = %status.provider,
                endpoint = %status.endpoint,
                message = %status.message,
                "model_service::health check failed"
            );
        }
        status
    }

    /// Checks every profile in order.
    pub async fn check_many(&self, configs: &[ModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    async fn try_check(&self, cfg: &ModelConfig) -> Result<HealthStatus, ModelServiceError> {
        let endpoint = cfg.base_url();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(HealthError::InvalidEndpoint(cfg.endpoint.clone()).into());
        }

        let (path, listing) = health_target(cfg.provider);
        let url = format!("{endpoint}{path}");
        let mut req = self
            .client
            .get(&url)
            .timeout(cfg.timeout_secs.map_or(self.default_timeout, Duration::from_secs));
        if let Some(key) = &cfg.api_key {
            let auth = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| HealthError::Decode(format!("invalid API key header: {e}")))?;
            req = req.header(header::AUTHORIZATION, auth);
        }

        let start = Instant::now();
        debug!(provider = %cfg.provider, "model_service::health GET {url}");
        let resp = req.send().await?;
        let latency = start.elapsed().as_millis();

        if !resp.status().is_success() {
            let err = HttpError::from_response(&url, resp).await;
            return Err(HealthError::HttpStatus(err).into());
        }
        let Some(listing) = listing else {
            return Ok(HealthStatus::of(cfg, true, latency, format!("{} is healthy", cfg.provider)));
        };

        // A reachable server with an unreadable listing still counts as up.
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let status = match model_listed(listing, &body, &cfg.model) {
            Some(true) => HealthStatus::of(cfg, true, latency, "model is available"),
            Some(false) => HealthStatus::of(
                cfg,
                false,
                latency,
                format!("server is up, but model not listed at {path}"),
            ),
            None => HealthStatus::of(cfg, true, latency, format!("reachable; unexpected {path} body")),
        };
        Ok(status)
    }
}
