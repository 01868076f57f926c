//! Tool system for the conversation engine.
//!
//! Every tool declares a name, description, and JSON parameter schema, and
//! returns a [`ToolOutcome`]. Tools are rebuilt per turn by [`build_tools`]
//! so each instance carries the turn's session id and platform.

pub mod cron_jobs;
pub mod media;
pub mod memory_blobs;
pub mod sessions;
pub mod shell;
pub mod subagents;
pub mod system_info;
pub mod vision_task;
pub mod web;

use std::sync::Arc;

use async_trait::async_trait;
use otto_llm::ToolDefinition;

use crate::context::{ToolCtx, TurnContext};

/// Result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Text fed back to the LLM as the tool-role message.
    pub content: String,
    /// Skip any remaining tool calls in the same assistant batch.
    pub stop_batch: bool,
    /// The tool already pushed output to the user; the final assistant text
    /// must not duplicate it.
    pub output_already_sent: bool,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_batch: false,
            output_already_sent: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: format!("Error: {}", message.into()),
            stop_batch: false,
            output_already_sent: false,
        }
    }

    pub fn with_stop_batch(mut self) -> Self {
        self.stop_batch = true;
        self
    }

    pub fn already_sent(mut self) -> Self {
        self.output_already_sent = true;
        self
    }
}

/// Trait all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> serde_json::Value;
    async fn execute(&self, args: serde_json::Value) -> ToolOutcome;
}

/// Convert tools to the API-level definitions sent with every request.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters(),
        })
        .collect()
}

/// Build the full toolbox for one turn.
pub fn build_tools<C: TurnContext>(
    ctx: Arc<C>,
    session_id: &str,
    platform: &str,
) -> Vec<Box<dyn Tool>> {
    let t = ToolCtx::new(ctx, session_id, platform);
    vec![
        Box::new(shell::ExecuteCommandTool),
        Box::new(system_info::GetSystemInfoTool::new(t.clone())),
        Box::new(memory_blobs::UpdateUserMemoryTool::new(t.clone())),
        Box::new(memory_blobs::UpdatePersonalityTool::new(t.clone())),
        Box::new(memory_blobs::UpdateSubconsciousTool::new(t.clone())),
        Box::new(memory_blobs::SetConsciousFocusTool::new(t.clone())),
        Box::new(sessions::CreateSessionTool::new(t.clone())),
        Box::new(web::FetchUrlTool),
        Box::new(web::ManageSkillsTool::new(t.clone())),
        Box::new(cron_jobs::ManageCronJobTool::new(t.clone())),
        Box::new(media::SendMediaTool::new(t.clone())),
        Box::new(media::SearchAndSendGifTool::new(t.clone())),
        Box::new(subagents::DelegateTaskTool::new(t.clone())),
        Box::new(subagents::ListSubAgentsTool::new(t.clone())),
        Box::new(subagents::KillSubAgentTool::new(t.clone())),
        Box::new(subagents::KillAllSubAgentsTool::new(t.clone())),
        Box::new(subagents::MessageSubAgentTool::new(t.clone())),
        Box::new(vision_task::VisionTaskTool::new(t)),
    ]
}

pub(crate) fn require_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolOutcome> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolOutcome::error(format!("missing required parameter: {key}")))
}
