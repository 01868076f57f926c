//! Session management endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /session/create — `{session_id?}` → `{session_id, status}`.
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let session_id = match req.session_id {
        Some(id) => {
            if id.contains(char::is_whitespace) || id.is_empty() {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "Session ID cannot contain spaces." })),
                );
            }
            id
        }
        None => Uuid::new_v4().to_string(),
    };

    match state.history.create(&session_id, None) {
        Ok(created) => {
            let status = if created { "created" } else { "exists" };
            (
                StatusCode::OK,
                Json(serde_json::json!({ "session_id": session_id, "status": status })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// GET /sessions/list — all sessions, newest first.
pub async fn list_sessions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.history.list() {
        Ok(sessions) => (StatusCode::OK, Json(serde_json::json!(sessions))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
