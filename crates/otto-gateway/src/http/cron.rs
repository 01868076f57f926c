//! Scheduler CRUD and the manual webhook trigger.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use otto_scheduler::{ScheduleKind, SchedulerEngine, SchedulerError};
use serde::Deserialize;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub schedule_type: String,
    pub schedule_value: String,
    pub task: String,
}

/// POST /cron/jobs
pub async fn create_job_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> impl IntoResponse {
    let kind: ScheduleKind = match req.schedule_type.parse() {
        Ok(k) => k,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    };

    match state
        .cron
        .create_job(&req.name, kind, &req.schedule_value, &req.task)
    {
        Ok(job) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "created", "job_id": job.id })),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// GET /cron/jobs
pub async fn list_jobs_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.cron.list_jobs() {
        Ok(jobs) => (StatusCode::OK, Json(serde_json::json!(jobs))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// DELETE /cron/jobs/{id}
pub async fn delete_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.cron.delete_job(&id) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "deleted" }))),
        Err(SchedulerError::JobNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Job not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// POST /cron/webhook/{id} — manual trigger; fires webhook and timer jobs alike.
pub async fn trigger_webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match SchedulerEngine::trigger(&state.cron, &state.fired_tx, &id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "triggered" })),
        ),
        Err(SchedulerError::JobNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Job not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
