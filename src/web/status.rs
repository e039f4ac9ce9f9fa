//! `GET /api/health` -- ambient liveness endpoint.

use axum::response::Json;
use serde_json::{json, Value};
use tracing::trace;

pub async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
