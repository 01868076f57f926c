//! Delivery loop for fired scheduler jobs.
//!
//! Every fire runs a fresh engine turn under a unique `cron_<jobid>_<rand>`
//! session so context never accumulates between fires. The final reply goes
//! to the first allow-listed whatsapp recipient, when one is configured.

use std::sync::Arc;

use otto_core::SELF_TAG;
use otto_scheduler::FiredJob;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::app::{run_turn_quiet, AppState};

pub async fn run_delivery_loop(state: Arc<AppState>, mut fired_rx: mpsc::Receiver<FiredJob>) {
    info!("scheduler delivery loop started");
    while let Some(job) = fired_rx.recv().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            deliver(state, job).await;
        });
    }
    info!("scheduler delivery loop stopped");
}

async fn deliver(state: Arc<AppState>, job: FiredJob) {
    let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let session_id = format!("cron_{}_{}", job.id, run_id);
    info!(job_id = %job.id, name = %job.name, session = %session_id, "running scheduled task");

    match run_turn_quiet(&state, &session_id, "whatsapp", &job.task).await {
        Ok(reply) => {
            let Some(recipient) = state.config.whatsapp.allowed_numbers.first() else {
                info!(job_id = %job.id, "no configured recipient — job result logged only");
                return;
            };
            state
                .bridge
                .send_text_best_effort(
                    recipient,
                    "whatsapp",
                    &format!("{SELF_TAG} [{}] {}\n\n{reply}", job.name, job.task),
                )
                .await;
        }
        Err(e) => {
            // Scheduler work never takes the process down.
            error!(job_id = %job.id, error = %e, "scheduled task failed");
        }
    }
}
