use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::{debug, error, info};

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::{AppError, AppResult},
    middleware_layer::request_id,
    routes::index::index_request::IndexBody,
};

pub async fn index_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<IndexBody>,
) -> AppResult<Response> {
    let request_id = request_id::of(&headers);
    if body.documents.is_empty() {
        return Err(AppError::BadRequest("`documents` must not be empty".into()));
    }
    debug!(
        request_id = %request_id,
        documents = body.documents.len(),
        force_reembed = body.force_reembed,
        "index_route: start"
    );

    let summary = state
        .rag
        .index_documents(&body.documents, body.options())
        .await
        .inspect_err(|e| {
            error!(request_id = %request_id, error = %e, "index_route: indexing failed");
        })?;

    info!(
        request_id = %request_id,
        embedded = summary.embedded,
        unchanged = summary.unchanged,
        deleted = summary.deleted,
        failed = summary.failed.len(),
        "index_route: done"
    );
    Ok(ApiResponse::success(summary).into_response_with_status(StatusCode::OK))
}
