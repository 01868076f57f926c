use std::net::SocketAddr;
use std::sync::Arc;

use otto_channels::{BridgeClient, PendingQuestions};
use otto_core::config::OttoConfig;
use otto_llm::openai::OpenAiProvider;
use otto_llm::LlmProvider;
use otto_memory::MemoryStore;
use otto_scheduler::{CronStore, SchedulerEngine};
use otto_sessions::HistoryStore;
use otto_vision::{CommandDriver, VisionDeps, VisionHandle};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

mod app;
mod daemons;
mod delivery;
mod http;
mod router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otto=info,tower_http=debug".into()),
        )
        .init();

    // Config resolution: OTTO_CONFIG env > ~/.otto/otto.toml > defaults.
    let config_path = std::env::var("OTTO_CONFIG").ok();
    let config = OttoConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        OttoConfig::default()
    });
    config.ensure_work_dirs()?;

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let history = HistoryStore::open(&config.database.path)?;
    let memory = MemoryStore::new(config.configs_dir());
    let cron = Arc::new(CronStore::open(&config.database.path)?);
    let bridge = Arc::new(BridgeClient::new(config.bridge.url.clone()));
    let questions = Arc::new(PendingQuestions::new());

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    let vision_provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.resolved_vision_api_key().to_string(),
        config.resolved_vision_base_url().map(String::from),
    ));

    let vision = VisionHandle::new(VisionDeps {
        provider: vision_provider,
        bridge: Arc::clone(&bridge),
        questions: Arc::clone(&questions),
        driver: Arc::new(CommandDriver::new()),
        model: config.resolved_vision_model().to_string(),
        screenshots_dir: config.screenshots_dir(),
    });

    let (fired_tx, fired_rx) = mpsc::channel(64);
    let state = Arc::new(app::AppState::new(
        config.clone(),
        history,
        memory,
        bridge,
        questions,
        Arc::clone(&cron),
        vision,
        provider,
        fired_tx.clone(),
    ));

    // Scheduler: the tick engine fires jobs, the delivery loop runs them.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(SchedulerEngine::new(cron, fired_tx).run(shutdown_rx));
    tokio::spawn(delivery::run_delivery_loop(Arc::clone(&state), fired_rx));

    // Reflection loops.
    let _heartbeat = daemons::heartbeat::spawn(Arc::clone(&state));
    let _subconscious = daemons::subconscious::spawn(Arc::clone(&state));
    let _conscious = daemons::conscious::spawn(Arc::clone(&state));

    let router = app::build_router(Arc::clone(&state));
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("otto gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
