use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::{AppError, AppResult},
    middleware_layer::request_id,
};

#[derive(Debug, Serialize)]
pub struct RemovedDocument {
    pub document_id: String,
    pub deleted: usize,
}

/// `DELETE /documents/{id}`; unknown ids report `deleted: 0`.
pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> AppResult<Response> {
    let request_id = request_id::of(&headers);
    let document_id = document_id.trim_matches('/').to_string();
    if document_id.is_empty() {
        return Err(AppError::BadRequest("document id must not be empty".into()));
    }

    let deleted = state
        .rag
        .remove_document(&document_id)
        .await
        .inspect_err(|e| {
            error!(request_id = %request_id, document_id = %document_id, error = %e, "documents_route: remove failed");
        })?;

    debug!(request_id = %request_id, document_id = %document_id, deleted, "documents_route: removed");
    Ok(ApiResponse::success(RemovedDocument {
        document_id,
        deleted,
    })
    .into_response_with_status(StatusCode::OK))
}
