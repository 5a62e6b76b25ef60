pub mod cleanup;
pub mod health;
pub mod pages;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::stats_handler))
        .route("/stats", get(health::stats_handler))
        // Browser flow
        .route("/", get(upload::handle_index))
        .route("/upload", post(upload::handle_upload))
        .route("/download/:filename", get(upload::handle_download_page))
        .route("/get_file/:filename", get(upload::handle_get_file))
        // JSON API
        .route("/api/analyze", post(handlers::handle_analyze))
        .route("/cleanup", post(cleanup::handle_cleanup))
        .fallback(pages::handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
