use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use dashmap::DashMap;
use otto_agent::{EngineError, EngineEvent, SubAgentManager, TurnContext};
use otto_channels::{BridgeClient, PendingQuestions};
use otto_core::config::OttoConfig;
use otto_llm::LlmProvider;
use otto_memory::MemoryStore;
use otto_scheduler::{CronStore, FiredJob};
use otto_sessions::HistoryStore;
use otto_vision::VisionHandle;
use tokio::sync::mpsc;

use crate::router::ProcessedMessages;

/// Central shared state — passed as `Arc<AppState>` to all Axum handlers and
/// to every engine turn as its `TurnContext`.
pub struct AppState {
    pub config: OttoConfig,
    pub history: HistoryStore,
    pub memory: MemoryStore,
    pub bridge: Arc<BridgeClient>,
    /// Shared with the vision worker so ASK_USER questions resolve through
    /// the router.
    pub questions: Arc<PendingQuestions>,
    pub cron: Arc<CronStore>,
    pub sub_agents: SubAgentManager,
    pub vision: VisionHandle,
    pub provider: Arc<dyn LlmProvider>,
    /// Manual triggers and the HTTP webhook route feed fired jobs here.
    pub fired_tx: mpsc::Sender<FiredJob>,
    /// Inbound message-id dedup set.
    pub processed: ProcessedMessages,
    /// Per-session turn serialization: concurrent inbound events for one
    /// session run one engine turn at a time.
    turn_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OttoConfig,
        history: HistoryStore,
        memory: MemoryStore,
        bridge: Arc<BridgeClient>,
        questions: Arc<PendingQuestions>,
        cron: Arc<CronStore>,
        vision: VisionHandle,
        provider: Arc<dyn LlmProvider>,
        fired_tx: mpsc::Sender<FiredJob>,
    ) -> Self {
        Self {
            config,
            history,
            memory,
            bridge,
            questions,
            cron,
            sub_agents: SubAgentManager::new(),
            vision,
            provider,
            fired_tx,
            processed: ProcessedMessages::new(),
            turn_locks: DashMap::new(),
        }
    }

    pub fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl TurnContext for AppState {
    fn history(&self) -> &HistoryStore {
        &self.history
    }
    fn memory(&self) -> &MemoryStore {
        &self.memory
    }
    fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }
    fn questions(&self) -> &PendingQuestions {
        self.questions.as_ref()
    }
    fn cron(&self) -> &CronStore {
        &self.cron
    }
    fn sub_agents(&self) -> &SubAgentManager {
        &self.sub_agents
    }
    fn vision(&self) -> &VisionHandle {
        &self.vision
    }
    fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }
    fn model(&self) -> String {
        self.config.llm.model.clone()
    }
    fn skills_dir(&self) -> PathBuf {
        self.config.skills_dir()
    }
    fn giphy_api_key(&self) -> Option<String> {
        self.config.giphy_api_key.clone()
    }
}

/// Run one engine turn with its events discarded, serialized per session.
///
/// Used by every caller that only wants the final reply (HTTP non-streaming
/// chat, cron delivery, reflection daemons).
pub async fn run_turn_quiet(
    state: &Arc<AppState>,
    session_id: &str,
    platform: &str,
    text: &str,
) -> Result<String, EngineError> {
    let lock = state.turn_lock(session_id);
    let _guard = lock.lock().await;

    let (tx, mut rx) = mpsc::channel::<EngineEvent>(64);
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let result = otto_agent::run_turn(state, session_id, platform, text, &tx).await;
    drop(tx);
    let _ = drain.await;
    result
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::status::status_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route(
            "/session/create",
            post(crate::http::sessions::create_session_handler),
        )
        .route(
            "/sessions/list",
            get(crate::http::sessions::list_sessions_handler),
        )
        .route(
            "/whatsapp/incoming",
            post(crate::http::incoming::incoming_handler),
        )
        .route("/cron/jobs", post(crate::http::cron::create_job_handler))
        .route("/cron/jobs", get(crate::http::cron::list_jobs_handler))
        .route(
            "/cron/jobs/{id}",
            delete(crate::http::cron::delete_job_handler),
        )
        .route(
            "/cron/webhook/{id}",
            post(crate::http::cron::trigger_webhook_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
