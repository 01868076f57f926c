//! Heartbeat — executes routine tasks from HEARTBEAT.md on a fixed cadence.
//!
//! The file carries YAML front matter (`enabled`, `interval_seconds`)
//! followed by a bulleted task list. A pulse is postponed while any
//! sub-agent or vision goal is active, so background work never competes
//! with itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::app::{run_turn_quiet, AppState};

pub const HEARTBEAT_SESSION_ID: &str = "heartbeat-monitor";
const IDLE_POLL_SECS: u64 = 10;
const DISABLED_POLL_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    240
}

/// Parse HEARTBEAT.md: `---` front matter, then `-`/`*` bullets as tasks.
pub fn parse_heartbeat_file(content: &str) -> (HeartbeatConfig, Vec<String>) {
    let parts: Vec<&str> = content.splitn(3, "---").collect();
    if parts.len() < 3 {
        return (HeartbeatConfig::default(), Vec::new());
    }

    let config = serde_yaml::from_str(parts[1]).unwrap_or_else(|e| {
        warn!(error = %e, "heartbeat front matter did not parse");
        HeartbeatConfig::default()
    });

    let tasks = parts[2]
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    (config, tasks)
}

fn pulse_prompt(tasks: &[String]) -> String {
    let list: String = tasks.iter().map(|t| format!("- {t}\n")).collect();
    format!(
        "[HEARTBEAT] Automated productivity pulse. Execute the following routine tasks:\n\n{list}\nVerify their status and report only on the outcomes. If a task needs no action, let it pass."
    )
}

pub fn spawn(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("heartbeat daemon started");
        let path = state.config.configs_dir().join("HEARTBEAT.md");
        let mut last_run: Option<Instant> = None;

        loop {
            let (config, tasks) = match tokio::fs::read_to_string(&path).await {
                Ok(content) => parse_heartbeat_file(&content),
                Err(_) => (HeartbeatConfig::default(), Vec::new()),
            };

            if !config.enabled {
                tokio::time::sleep(Duration::from_secs(DISABLED_POLL_SECS)).await;
                continue;
            }

            let due = last_run
                .map(|t| t.elapsed() >= Duration::from_secs(config.interval_seconds))
                .unwrap_or(true);
            if !due {
                tokio::time::sleep(Duration::from_secs(IDLE_POLL_SECS)).await;
                continue;
            }

            // Never pulse while background work is in flight.
            if state.sub_agents.any_working() || state.vision.is_busy() {
                debug!("heartbeat postponed: background workers busy");
                tokio::time::sleep(Duration::from_secs(IDLE_POLL_SECS)).await;
                continue;
            }

            if !tasks.is_empty() {
                info!(tasks = tasks.len(), "heartbeat pulse");
                if let Err(e) = run_turn_quiet(
                    &state,
                    HEARTBEAT_SESSION_ID,
                    "heartbeat",
                    &pulse_prompt(&tasks),
                )
                .await
                {
                    error!(error = %e, "heartbeat pulse failed");
                }
            }
            last_run = Some(Instant::now());
            tokio::time::sleep(Duration::from_secs(IDLE_POLL_SECS)).await;
        }
    })
}
