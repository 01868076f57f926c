//! POST /chat — direct HTTP conversation with the agent.
//!
//! Non-streaming returns `{"response": "..."}` once the turn finishes.
//! Streaming returns a chunked plain-text stream: model text verbatim,
//! progress lines prefixed with `>>> `.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use otto_agent::EngineEvent;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::app::{run_turn_quiet, AppState};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default".to_string()
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "message cannot be empty" })),
        )
            .into_response();
    }

    if !req.stream {
        return match run_turn_quiet(&state, &req.session_id, "api", &req.message).await {
            Ok(reply) => Json(serde_json::json!({ "response": reply })).into_response(),
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        };
    }

    // Streaming: run the engine on a background task and forward its events
    // as text chunks. The per-session lock is held for the whole turn.
    let (tx, rx) = mpsc::channel::<EngineEvent>(64);
    let session_id = req.session_id.clone();
    let message = req.message.clone();
    tokio::spawn(async move {
        let lock = state.turn_lock(&session_id);
        let _guard = lock.lock().await;
        if let Err(e) = otto_agent::run_turn(&state, &session_id, "api", &message, &tx).await {
            warn!(error = %e, "streaming chat turn failed");
        }
    });

    use tokio_stream::StreamExt as _;
    let body_stream =
        ReceiverStream::new(rx).map(|ev| Ok::<_, std::convert::Infallible>(render_event(ev)));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Render one engine event as a stream chunk.
fn render_event(event: EngineEvent) -> String {
    match event {
        EngineEvent::TextChunk(text) => text,
        EngineEvent::Status(line) => format!(">>> {line}\n"),
        EngineEvent::ToolStart { name, arguments } => {
            format!(">>> [Tool] {name} {arguments}\n")
        }
        EngineEvent::ToolResult { name, result } => {
            format!(">>> [Result] {name}: {result}\n")
        }
        EngineEvent::Error(message) => format!(">>> [CRITICAL] {message}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunks_pass_through_verbatim() {
        assert_eq!(render_event(EngineEvent::TextChunk("Hi".into())), "Hi");
    }

    #[test]
    fn status_lines_are_prefixed() {
        let line = render_event(EngineEvent::Status("[System] retrying".into()));
        assert!(line.starts_with(">>> "));
        let line = render_event(EngineEvent::Error("boom".into()));
        assert!(line.contains("[CRITICAL]"));
    }
}
