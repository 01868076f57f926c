//! POST /whatsapp/incoming — the normalized inbound event from the bridge.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::app::AppState;
use crate::router::{route_inbound, InboundEvent};

/// Replies with an opaque status envelope; the bridge only logs it.
pub async fn incoming_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundEvent>,
) -> Json<serde_json::Value> {
    let outcome = route_inbound(state, event).await;
    Json(serde_json::json!({ "status": outcome.status() }))
}
