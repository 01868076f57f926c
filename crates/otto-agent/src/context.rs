use std::path::PathBuf;
use std::sync::Arc;

use otto_channels::{BridgeClient, PendingQuestions};
use otto_llm::LlmProvider;
use otto_memory::MemoryStore;
use otto_scheduler::CronStore;
use otto_sessions::HistoryStore;
use otto_vision::VisionHandle;

use crate::supervisor::SubAgentManager;

/// Capability handles available to one engine turn and its tools.
///
/// Implemented by the gateway's shared state. Tools depend on this trait
/// instead of concrete runtime internals, which breaks the engine ↔ tool
/// reference cycle and keeps tools testable against a fixture context.
pub trait TurnContext: Send + Sync + 'static {
    fn history(&self) -> &HistoryStore;
    fn memory(&self) -> &MemoryStore;
    fn bridge(&self) -> &BridgeClient;
    fn questions(&self) -> &PendingQuestions;
    fn cron(&self) -> &CronStore;
    fn sub_agents(&self) -> &SubAgentManager;
    fn vision(&self) -> &VisionHandle;

    /// Owned handle so spawned workers can outlive the current turn.
    fn provider(&self) -> Arc<dyn LlmProvider>;

    /// Model id for engine turns.
    fn model(&self) -> String;

    fn skills_dir(&self) -> PathBuf;

    fn giphy_api_key(&self) -> Option<String>;
}

/// Per-turn routing info handed to every tool at construction.
pub struct ToolCtx<C: TurnContext> {
    pub ctx: Arc<C>,
    pub session_id: String,
    pub platform: String,
}

impl<C: TurnContext> Clone for ToolCtx<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            session_id: self.session_id.clone(),
            platform: self.platform.clone(),
        }
    }
}

impl<C: TurnContext> ToolCtx<C> {
    pub fn new(ctx: Arc<C>, session_id: &str, platform: &str) -> Self {
        Self {
            ctx,
            session_id: session_id.to_string(),
            platform: platform.to_string(),
        }
    }
}
