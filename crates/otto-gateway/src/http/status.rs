use axum::Json;

/// GET / — liveness probe.
pub async fn status_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "Otto backend running" }))
}
