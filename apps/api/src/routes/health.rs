use axum::Json;
use serde_json::{json, Value};

/// GET /stats, GET /health
/// Returns a static status object with service version.
pub async fn stats_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime": "Service actif",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
