use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Response};
use model_service::health_service::HealthStatus;
use serde::Serialize;
use tracing::warn;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub accepting_requests: bool,
    pub providers: Vec<HealthStatus>,
}

/// `GET /health`: 200 when every check passes, 503 otherwise.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let providers = state.models.health_all().await;
    let accepting_requests = !state.rag.is_closed();
    let ok = accepting_requests && providers.iter().all(|p| p.ok);

    if !ok {
        for p in providers.iter().filter(|p| !p.ok) {
            warn!(provider = %p.provider, endpoint = %p.endpoint, message = %p.message, "health_route: check failed");
        }
    }

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    ApiResponse::success(HealthReport {
        ok,
        accepting_requests,
        providers,
    })
    .into_response_with_status(status)
}
