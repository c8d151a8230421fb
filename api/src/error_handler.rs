use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use model_service::ModelServiceError;
use rag_store::RagError;
use thiserror::Error;
use tracing::error;

use crate::core::http::response_envelope::ApiResponse;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot ---
    #[error(transparent)]
    Model(#[from] ModelServiceError),

    // --- Pipeline ---
    #[error(transparent)]
    Rag(#[from] RagError),

    // --- Server ---
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rag(e) => rag_status(e).0,
            AppError::Model(_) | AppError::Bind(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Model(_) => "MODEL_SERVICE_ERROR",
            AppError::Rag(e) => rag_status(e).1,
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

fn rag_status(err: &RagError) -> (StatusCode, &'static str) {
    match err {
        RagError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        RagError::Retrieval { .. } => (StatusCode::BAD_GATEWAY, "RETRIEVAL_FAILED"),
        RagError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        RagError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        RagError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        RagError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        RagError::VectorSizeMismatch { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "VECTOR_SIZE_MISMATCH")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("api::AppError {status}: {self}");
        }
        ApiResponse::<()>::error(self.error_code(), self.to_string(), Vec::new())
            .into_response_with_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_failure_is_bad_gateway() {
        let e = AppError::from(RagError::Retrieval {
            vector: "timeout".into(),
            keyword: "down".into(),
        });
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.error_code(), "RETRIEVAL_FAILED");
    }

    #[test]
    fn empty_query_is_client_error() {
        let e = AppError::from(RagError::InvalidRequest("query must not be empty".into()));
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn closed_store_is_unavailable() {
        let e = AppError::from(RagError::Store("store is closed".into()));
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.error_code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn unready_store_is_provider_error() {
        let e = AppError::from(RagError::from(rag_store::ProviderError::Unavailable(
            "qdrant create_collection: connection refused".into(),
        )));
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.error_code(), "PROVIDER_ERROR");
    }
}
