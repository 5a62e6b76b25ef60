//! Axum route handlers for the Analysis API.

use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};

use crate::analysis::jd_analyzer::{analyze_job_description, JobAnalysis};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: JobAnalysis,
}

/// POST /api/analyze
///
/// Analyzes a job description without adapting any résumé.
pub async fn handle_analyze(
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!("Rejected non-JSON analysis request: {e}");
        AppError::Validation("Request body must be JSON".to_string())
    })?;

    if request.job_description.trim().is_empty() {
        tracing::warn!("Empty job description in analysis request");
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let analysis = analyze_job_description(&request.job_description);

    Ok(Json(AnalyzeResponse {
        success: true,
        analysis,
    }))
}
