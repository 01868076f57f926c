//! Subconscious — surfaces on a random cadence and either seeds a first
//! experiment or acts on one of the ideas already stored in the
//! subconscious blob.

use std::sync::Arc;
use std::time::Duration;

use otto_memory::MemoryKind;
use rand::Rng;
use tracing::{error, info};

use crate::app::{run_turn_quiet, AppState};

pub const SUBCONSCIOUS_SESSION_ID: &str = "subconscious-innovator";
/// Surfacing interval bounds, in seconds.
const MIN_WAIT_SECS: u64 = 5 * 60;
const MAX_WAIT_SECS: u64 = 15 * 60;
/// Let the rest of the system settle after boot before the first surfacing.
const STARTUP_DELAY_SECS: u64 = 60;

/// Build the surfacing prompt from the current subconscious blob.
pub fn surfacing_prompt(blob: &str) -> String {
    if blob.trim().is_empty() {
        "[SUBCONSCIOUS SURFACING]\n\
         Your subconscious is empty. Time to innovate: perform one small \
         experiment or optimization on this computer that could help the user \
         or improve your own efficiency. Update your subconscious with the result."
            .to_string()
    } else {
        format!(
            "[SUBCONSCIOUS SURFACING]\n\
             Based on your current subconscious memory:\n---\n{blob}\n---\n\
             Choose one idea, lesson, or experiment from it and act on it right \
             now. Complete the task and update your subconscious with the new findings."
        )
    }
}

pub fn spawn(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("subconscious daemon started");
        tokio::time::sleep(Duration::from_secs(STARTUP_DELAY_SECS)).await;

        loop {
            let wait = rand::thread_rng().gen_range(MIN_WAIT_SECS..=MAX_WAIT_SECS);
            info!(minutes = wait / 60, "next subconscious surfacing scheduled");
            tokio::time::sleep(Duration::from_secs(wait)).await;

            let blob = match state.memory.read(MemoryKind::Subconscious) {
                Ok(blob) => blob,
                Err(e) => {
                    error!(error = %e, "could not read subconscious blob");
                    continue;
                }
            };

            if let Err(e) = run_turn_quiet(
                &state,
                SUBCONSCIOUS_SESSION_ID,
                "subconscious",
                &surfacing_prompt(&blob),
            )
            .await
            {
                error!(error = %e, "subconscious surfacing failed");
            }
        }
    })
}
