//! Supervisor tools: delegate, list, kill, kill-all, and message.

use async_trait::async_trait;
use otto_core::SELF_TAG;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

pub struct DelegateTaskTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> DelegateTaskTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for DelegateTaskTool<C> {
    fn name(&self) -> &str {
        "delegate_task"
    }

    fn description(&self) -> &str {
        "Delegate a complex or background task to a named sub-agent. Once \
         delegated you MUST stop and wait; do not attempt the task yourself."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sub_agent_name": { "type": "string" },
                "task": { "type": "string" }
            },
            "required": ["sub_agent_name", "task"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let name = match require_str(&args, "sub_agent_name") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let task = match require_str(&args, "task") {
            Ok(v) => v,
            Err(out) => return out,
        };

        let status = self.t.ctx.sub_agents().delegate(
            self.t.ctx.clone(),
            &self.t.session_id,
            name,
            task,
            &self.t.platform,
        );

        if !status.starts_with("Error") {
            let mut brief = task.to_string();
            if brief.len() > 200 {
                brief.truncate(200);
                brief.push_str("...");
            }
            self.t
                .ctx
                .bridge()
                .send_text_best_effort(
                    &self.t.session_id,
                    &self.t.platform,
                    &format!(
                        "{SELF_TAG} Sub-agent '{name}' started.\nTask: {brief}\nWorking in the background — you'll get a report here when it's done."
                    ),
                )
                .await;
        }

        // Delegation always ends the batch so the model cannot also attempt
        // the task itself.
        ToolOutcome::success(status).with_stop_batch()
    }
}

pub struct ListSubAgentsTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> ListSubAgentsTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for ListSubAgentsTool<C> {
    fn name(&self) -> &str {
        "list_sub_agents"
    }

    fn description(&self) -> &str {
        "List all sub-agents of this session and their statuses."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> ToolOutcome {
        let agents = self.t.ctx.sub_agents().list(&self.t.session_id);
        ToolOutcome::success(
            serde_json::to_string_pretty(&agents).unwrap_or_else(|_| "[]".to_string()),
        )
    }
}

pub struct KillSubAgentTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> KillSubAgentTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for KillSubAgentTool<C> {
    fn name(&self) -> &str {
        "kill_sub_agent"
    }

    fn description(&self) -> &str {
        "Gracefully terminate a sub-agent by name. Use this instead of system \
         commands to stop sub-agents."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sub_agent_name": { "type": "string", "description": "Name of the sub-agent." }
            },
            "required": ["sub_agent_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let name = match require_str(&args, "sub_agent_name") {
            Ok(v) => v,
            Err(out) => return out,
        };
        ToolOutcome::success(self.t.ctx.sub_agents().kill(
            self.t.ctx.as_ref(),
            &self.t.session_id,
            name,
        ))
    }
}

pub struct KillAllSubAgentsTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> KillAllSubAgentsTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for KillAllSubAgentsTool<C> {
    fn name(&self) -> &str {
        "kill_all_sub_agents"
    }

    fn description(&self) -> &str {
        "Terminate every sub-agent in the current session."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> ToolOutcome {
        ToolOutcome::success(
            self.t
                .ctx
                .sub_agents()
                .kill_all(self.t.ctx.as_ref(), &self.t.session_id),
        )
    }
}

pub struct MessageSubAgentTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> MessageSubAgentTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for MessageSubAgentTool<C> {
    fn name(&self) -> &str {
        "message_sub_agent"
    }

    fn description(&self) -> &str {
        "Send a message or instruction to an active sub-agent. The name \
         'vision' routes the message to the vision worker as a correction."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sub_agent_name": { "type": "string", "description": "Target sub-agent, or 'vision'." },
                "message": { "type": "string", "description": "The message or new goal." }
            },
            "required": ["sub_agent_name", "message"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let name = match require_str(&args, "sub_agent_name") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let message = match require_str(&args, "message") {
            Ok(v) => v,
            Err(out) => return out,
        };
        ToolOutcome::success(self.t.ctx.sub_agents().message(
            self.t.ctx.as_ref(),
            &self.t.session_id,
            name,
            "Session Agent",
            message,
            &self.t.platform,
        ))
    }
}
