use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::{debug, error, warn};

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
    middleware_layer::request_id,
    routes::search::search_request::SearchBody,
};

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> AppResult<Response> {
    let request_id = request_id::of(&headers);
    debug!(
        request_id = %request_id,
        query = %body.query,
        limit = ?body.limit,
        "search_route: start"
    );

    let outcome = state.rag.search(body.into()).await.inspect_err(|e| {
        error!(request_id = %request_id, error = %e, "search_route: search failed");
    })?;

    if let Some(branch) = outcome.degraded {
        warn!(request_id = %request_id, failed_branch = ?branch, "search_route: degraded result");
    }
    debug!(
        request_id = %request_id,
        hits = outcome.results.len(),
        reranked = outcome.reranked,
        "search_route: success"
    );

    Ok(ApiResponse::success(outcome).into_response_with_status(StatusCode::OK))
}
