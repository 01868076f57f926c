//! Conscious — the high-precision background worker. Ticks on a short
//! random cadence; when the focus blob is idle it hunts for a task to pick
//! up, otherwise it pushes the current focus one concrete step forward.

use std::sync::Arc;
use std::time::Duration;

use otto_memory::{MemoryKind, MemoryStore};
use rand::Rng;
use tracing::{error, info};

use crate::app::{run_turn_quiet, AppState};

pub const CONSCIOUS_SESSION_ID: &str = "conscious-worker";
/// Tick interval bounds, in seconds.
const MIN_WAIT_SECS: u64 = 2 * 60;
const MAX_WAIT_SECS: u64 = 5 * 60;

/// Build the tick prompt. Reading the blob has already applied expiry.
pub fn tick_prompt(focus: &str) -> String {
    if MemoryStore::is_idle_focus(focus) {
        "[CONSCIOUS TICK]\n\
         No active focus. Autonomous job search: review your memories, pending \
         work, and the state of this computer, pick ONE worthwhile task, set it \
         as your conscious focus, and start on it immediately."
            .to_string()
    } else {
        format!(
            "[CONSCIOUS TICK]\n\
             Your current focus:\n---\n{focus}\n---\n\
             Take the next immediate, concrete step on this focus now. When the \
             focus is complete, clear it by setting a new one or letting it expire."
        )
    }
}

pub fn spawn(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("conscious daemon started");
        loop {
            let wait = rand::thread_rng().gen_range(MIN_WAIT_SECS..=MAX_WAIT_SECS);
            tokio::time::sleep(Duration::from_secs(wait)).await;

            // The read applies the expiry rule, so a stale focus comes back
            // as the idle sentinel.
            let focus = match state.memory.read(MemoryKind::Conscious) {
                Ok(focus) => focus,
                Err(e) => {
                    error!(error = %e, "could not read conscious blob");
                    continue;
                }
            };

            if let Err(e) = run_turn_quiet(
                &state,
                CONSCIOUS_SESSION_ID,
                "conscious",
                &tick_prompt(&focus),
            )
            .await
            {
                error!(error = %e, "conscious tick failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use otto_memory::store::{FOCUS_EMPTY, FOCUS_EXPIRED};

    #[test]
    fn idle_sentinels_trigger_job_search() {
        assert!(tick_prompt(FOCUS_EMPTY).contains("job search"));
        assert!(tick_prompt(FOCUS_EXPIRED).contains("job search"));
    }

    #[test]
    fn active_focus_asks_for_the_next_step() {
        let prompt = tick_prompt("TIMESTAMP: x\nDURATION: 10\n\nACTIVE FOCUS:\nSort downloads");
        assert!(prompt.contains("Sort downloads"));
        assert!(prompt.contains("next immediate"));
    }
}
