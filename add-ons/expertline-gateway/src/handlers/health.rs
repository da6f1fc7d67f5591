//! Liveness probe.

use axum::response::Json;
use serde_json::json;

/// GET /api/v1/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "expertline-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
