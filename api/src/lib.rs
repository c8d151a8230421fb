//! HTTP surface over the hybrid documentation search.
//!
//! Routes:
//! - `POST /index`: incremental indexing of a batch of documents
//! - `DELETE /documents/{id}`: drop every chunk of one document
//! - `POST /search`: hybrid search
//! - `GET /health`: model backend health checks

mod core;
mod error_handler;
mod middleware_layer;
mod routes;

pub use error_handler::{AppError, AppResult};

use std::{env, sync::Arc};

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tokio::signal;
use tracing::{info, warn};

use crate::core::app_state::AppState;
use crate::middleware_layer::{json_extractor::json_error_mapper, request_id::request_id};
use crate::routes::{
    documents_route::remove_document, health_route::health, index::index_route::index_documents,
    search::search_route::search,
};

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";

/// Builds the shared state from the environment, serves until Ctrl+C and
/// closes the store on the way out.
///
/// # Errors
/// Configuration or store bootstrap failures, and listener bind/serve errors.
pub async fn start() -> AppResult<()> {
    let host_url = env::var("API_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());

    let state = Arc::new(AppState::from_env().await?);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&host_url)
        .await
        .map_err(AppError::Bind)?;
    info!("api::start listening on {host_url}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server);

    state.rag.close();
    info!("api::start stopped");
    served
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/index", post(index_documents))
        // Document ids are path-like ("guides/install"), hence the wildcard.
        .route("/documents/{*id}", delete(remove_document))
        .route("/search", post(search))
        .route("/health", get(health))
        .layer(middleware::from_fn(json_error_mapper))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

/// Resolves on Ctrl+C. If the signal handler cannot be installed the server
/// keeps running until killed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("api::shutdown_signal cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("api::shutdown_signal received Ctrl+C, draining connections");
}
