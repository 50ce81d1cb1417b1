use axum::Json;
use serde_json::{json, Value};

/// Unauthenticated liveness probe with build identification.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "vulndesk",
        "version": env!("CARGO_PKG_VERSION"),
        "built": env!("BUILD_TIMESTAMP"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}
