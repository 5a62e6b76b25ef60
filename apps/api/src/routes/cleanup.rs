use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted_count: usize,
}

/// POST /cleanup
///
/// Deletes stored files older than the configured age. Requires `X-API-Key`.
pub async fn handle_cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, AppError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(state.config.cleanup_api_key.as_str()) {
        tracing::warn!("Cleanup attempt with missing or invalid API key");
        return Err(AppError::Unauthorized);
    }

    let storage = state.storage.clone();
    let max_age = state.config.max_file_age_hours;
    let deleted_count = tokio::task::spawn_blocking(move || storage.sweep(max_age))
        .await
        .map_err(|e| anyhow::anyhow!("cleanup task failed: {e}"))??;

    tracing::info!("Cleanup removed {deleted_count} files");
    Ok(Json(CleanupResponse {
        success: true,
        deleted_count,
    }))
}
