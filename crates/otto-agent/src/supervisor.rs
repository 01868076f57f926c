//! Sub-agent supervisor — a bounded pool of named background workers per
//! parent session.
//!
//! Each sub-agent reuses the conversation engine under its own isolated
//! session (`sub_<id>`), so its working history never pollutes the parent
//! conversation; completion reports route back to the parent session through
//! egress. A name is reused across delegations; killing bumps a run token so
//! an in-flight turn may finish but its result is discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use otto_core::SELF_TAG;
use otto_sessions::StoredMessage;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::TurnContext;
use crate::engine;

/// Hard cap on sub-agents per parent session.
pub const MAX_SUB_AGENTS_PER_SESSION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAgentStatus {
    Idle,
    Working,
    Completed,
    Failed,
    Terminated,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub result: Option<String>,
}

/// Snapshot row for `list_sub_agents`.
#[derive(Debug, Clone, Serialize)]
pub struct SubAgentInfo {
    pub id: String,
    pub name: String,
    pub status: SubAgentStatus,
    pub last_result: Option<String>,
}

struct SubAgent {
    id: String,
    name: String,
    status: SubAgentStatus,
    last_result: Option<String>,
    task_history: Vec<TaskRecord>,
    /// Bumped on every delegation and kill; a worker whose token is stale
    /// discards its result instead of reporting.
    run_token: u64,
}

/// Registry of sub-agents keyed by parent session.
#[derive(Default)]
pub struct SubAgentManager {
    sessions: Mutex<HashMap<String, Vec<Arc<Mutex<SubAgent>>>>>,
}

impl SubAgentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a task to the named sub-agent, creating it when under the cap.
    ///
    /// Returns a status string for the model: delegation confirmations and
    /// the busy/cap rejections all flow back as tool results.
    pub fn delegate<C: TurnContext>(
        &self,
        ctx: Arc<C>,
        parent_session: &str,
        name: &str,
        task: &str,
        platform: &str,
    ) -> String {
        let agent = {
            let mut sessions = self.sessions.lock().unwrap();
            let pool = sessions.entry(parent_session.to_string()).or_default();

            match pool.iter().find(|a| a.lock().unwrap().name == name) {
                Some(existing) => Arc::clone(existing),
                None => {
                    if pool.len() >= MAX_SUB_AGENTS_PER_SESSION {
                        return format!(
                            "Error: Maximum of {MAX_SUB_AGENTS_PER_SESSION} sub-agents reached for this session."
                        );
                    }
                    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
                    let created = Arc::new(Mutex::new(SubAgent {
                        id,
                        name: name.to_string(),
                        status: SubAgentStatus::Idle,
                        last_result: None,
                        task_history: Vec::new(),
                        run_token: 0,
                    }));
                    pool.push(Arc::clone(&created));
                    created
                }
            }
        };

        let (id, token) = {
            let mut a = agent.lock().unwrap();
            if a.status == SubAgentStatus::Working {
                return format!("Error: Sub-agent '{name}' is busy.");
            }
            a.status = SubAgentStatus::Working;
            a.run_token += 1;
            a.task_history.push(TaskRecord {
                task: task.to_string(),
                started_at: chrono::Utc::now().to_rfc3339(),
                finished_at: None,
                result: None,
            });
            (a.id.clone(), a.run_token)
        };

        info!(parent = %parent_session, %name, %id, "delegating task to sub-agent");
        spawn_worker(
            ctx,
            Arc::clone(&agent),
            token,
            parent_session.to_string(),
            name.to_string(),
            id,
            task.to_string(),
            platform.to_string(),
        );

        format!("Task delegated to '{name}'. It will report back here when done.")
    }

    /// Snapshot all sub-agents of a session.
    pub fn list(&self, parent_session: &str) -> Vec<SubAgentInfo> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(parent_session)
            .map(|pool| {
                pool.iter()
                    .map(|a| {
                        let a = a.lock().unwrap();
                        SubAgentInfo {
                            id: a.id.clone(),
                            name: a.name.clone(),
                            status: a.status,
                            last_result: a.last_result.clone(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Terminate one sub-agent and best-effort tear down vision work bound
    /// to the session. A running turn finishes but its result is discarded.
    pub fn kill<C: TurnContext>(&self, ctx: &C, parent_session: &str, name: &str) -> String {
        let found = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .get(parent_session)
                .and_then(|pool| pool.iter().find(|a| a.lock().unwrap().name == name).cloned())
        };

        match found {
            Some(agent) => {
                {
                    let mut a = agent.lock().unwrap();
                    a.status = SubAgentStatus::Terminated;
                    a.run_token += 1;
                }
                ctx.vision().request_teardown(parent_session);
                warn!(parent = %parent_session, %name, "sub-agent terminated");
                format!("Sub-agent '{name}' terminated.")
            }
            None => format!("Error: no sub-agent named '{name}' in this session."),
        }
    }

    /// Terminate every sub-agent in the session.
    pub fn kill_all<C: TurnContext>(&self, ctx: &C, parent_session: &str) -> String {
        let pool = {
            let sessions = self.sessions.lock().unwrap();
            sessions.get(parent_session).cloned().unwrap_or_default()
        };
        let mut killed = 0;
        for agent in &pool {
            let mut a = agent.lock().unwrap();
            if a.status == SubAgentStatus::Working || a.status == SubAgentStatus::Idle {
                killed += 1;
            }
            a.status = SubAgentStatus::Terminated;
            a.run_token += 1;
        }
        ctx.vision().request_teardown(parent_session);
        format!("Terminated {killed} sub-agent(s) ({} total in session).", pool.len())
    }

    /// Push a message into a sub-agent's working history.
    ///
    /// The reserved name `vision` reroutes to the vision worker's
    /// high-priority feedback queue instead.
    pub fn message<C: TurnContext>(
        &self,
        ctx: &C,
        parent_session: &str,
        name: &str,
        sender: &str,
        text: &str,
        platform: &str,
    ) -> String {
        if name.eq_ignore_ascii_case("vision") {
            return ctx.vision().submit(text, true, parent_session, platform);
        }

        let found = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .get(parent_session)
                .and_then(|pool| pool.iter().find(|a| a.lock().unwrap().name == name).cloned())
        };

        match found {
            Some(agent) => {
                let id = agent.lock().unwrap().id.clone();
                let sub_session = format!("sub_{id}");
                match ctx.history().append(
                    &sub_session,
                    &StoredMessage::user(format!("FROM {sender}: {text}")),
                ) {
                    Ok(()) => format!("Message stored for sub-agent '{name}'."),
                    Err(e) => format!("Error: could not message sub-agent '{name}': {e}"),
                }
            }
            None => format!("Error: no sub-agent named '{name}' in this session."),
        }
    }

    /// True while any sub-agent in any session is working. Heartbeat gate.
    pub fn any_working(&self) -> bool {
        let sessions = self.sessions.lock().unwrap();
        sessions.values().any(|pool| {
            pool.iter()
                .any(|a| a.lock().unwrap().status == SubAgentStatus::Working)
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker<C: TurnContext>(
    ctx: Arc<C>,
    agent: Arc<Mutex<SubAgent>>,
    token: u64,
    parent_session: String,
    name: String,
    id: String,
    task: String,
    platform: String,
) {
    tokio::spawn(async move {
        let sub_session = format!("sub_{id}");
        let prompt = format!(
            "BACKGROUND TASK: {task}\nYou are the sub-agent '{name}' working for session '{parent_session}'."
        );

        // Sub-agent progress events are not streamed anywhere; drain them.
        let (tx, mut rx) = mpsc::channel(64);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let result = engine::run_turn(&ctx, &sub_session, &platform, &prompt, &tx).await;
        drop(tx);
        let _ = drain.await;

        let report = {
            let mut a = agent.lock().unwrap();
            if a.run_token != token {
                info!(%name, "sub-agent was terminated mid-task — result discarded");
                return;
            }
            let now = chrono::Utc::now().to_rfc3339();
            if let Some(record) = a.task_history.last_mut() {
                record.finished_at = Some(now);
            }
            match &result {
                Ok(text) => {
                    a.status = SubAgentStatus::Completed;
                    a.last_result = Some(text.clone());
                    if let Some(record) = a.task_history.last_mut() {
                        record.result = Some(text.clone());
                    }
                    format!(
                        "{SELF_TAG} Sub-agent '{name}' finished:\n{}",
                        summarize(text)
                    )
                }
                Err(e) => {
                    a.status = SubAgentStatus::Failed;
                    a.last_result = Some(format!("Error: {e}"));
                    format!("{SELF_TAG} Sub-agent '{name}' failed: {e}")
                }
            }
        };

        ctx.bridge()
            .send_text_best_effort(&parent_session, &platform, &report)
            .await;
    });
}

fn summarize(text: &str) -> String {
    if text.trim().is_empty() {
        return "(no output)".to_string();
    }
    let mut s = text.to_string();
    if s.len() > 800 {
        s.truncate(800);
        s.push_str("...[truncated]");
    }
    s
}
