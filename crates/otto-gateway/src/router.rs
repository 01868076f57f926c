//! Session router — turns normalized inbound channel events into engine
//! turns, with duplicate suppression, echo drop, allow-list enforcement,
//! control commands, and pending-question arbitration.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use otto_core::{RESET_COMMAND, SELF_TAG};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::app::{run_turn_quiet, AppState};
use otto_channels::TypingHandle;

/// Cap on remembered inbound message ids. When the set exceeds this it is
/// cleared wholesale — cheap, and a replay window that old no longer matters.
const PROCESSED_CAP: usize = 1000;

/// Bounded set of recently seen inbound message ids.
pub struct ProcessedMessages {
    seen: Mutex<HashSet<String>>,
}

impl Default for ProcessedMessages {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessedMessages {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Record an id. Returns `false` when it was already present.
    pub fn insert(&self, message_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap();
        if seen.contains(message_id) {
            return false;
        }
        if seen.len() >= PROCESSED_CAP {
            seen.clear();
        }
        seen.insert(message_id.to_string());
        true
    }
}

/// Normalized inbound event from the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "senderName", default)]
    pub sender_name: Option<String>,
    #[serde(rename = "fromMe", default)]
    pub from_me: bool,
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "whatsapp".to_string()
}

/// Outcome reported back to the bridge as an opaque status envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Processed,
    Ignored,
    IgnoredDuplicate,
    IgnoredLoopPrevent,
    IgnoredUnauthorized,
    Reset,
    QuestionAnswered,
    EngineError,
}

impl RouteOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RouteOutcome::Processed => "processed",
            RouteOutcome::Ignored => "ignored",
            RouteOutcome::IgnoredDuplicate => "ignored_duplicate",
            RouteOutcome::IgnoredLoopPrevent => "ignored_loop_prevent",
            RouteOutcome::IgnoredUnauthorized => "ignored_unauthorized",
            RouteOutcome::Reset => "reset",
            RouteOutcome::QuestionAnswered => "question_answered",
            RouteOutcome::EngineError => "error",
        }
    }
}

/// Route one inbound event through the full pipeline.
pub async fn route_inbound(state: Arc<AppState>, event: InboundEvent) -> RouteOutcome {
    // Duplicate suppression comes first so replays do nothing at all.
    if let Some(id) = &event.message_id {
        if !state.processed.insert(id) {
            info!(message_id = %id, "dropping duplicate inbound message");
            return RouteOutcome::IgnoredDuplicate;
        }
    }

    let (Some(sender), Some(body)) = (event.from.clone(), event.body.clone()) else {
        return RouteOutcome::Ignored;
    };

    // Our own echo coming back through the bridge.
    if body.contains(SELF_TAG) {
        return RouteOutcome::IgnoredLoopPrevent;
    }

    // Allow-list applies to the phone messenger only.
    if event.platform == "whatsapp" {
        let allowed = &state.config.whatsapp.allowed_numbers;
        if !allowed.is_empty() && !allowed.iter().any(|num| sender.contains(num.as_str())) {
            warn!(sender = %sender, "unauthorized whatsapp sender");
            return RouteOutcome::IgnoredUnauthorized;
        }
    }

    // The sender id is the session id, so background workers can route
    // reports back without a lookup table.
    let session_id = sender.clone();
    if let Err(e) = state.history.create(&session_id, None) {
        error!(error = %e, "session create failed");
        return RouteOutcome::EngineError;
    }

    if body.trim().eq_ignore_ascii_case(RESET_COMMAND) {
        if let Err(e) = state.history.reset(&session_id) {
            error!(error = %e, "session reset failed");
            return RouteOutcome::EngineError;
        }
        info!(session = %session_id, "session reset by user");
        state
            .bridge
            .send_text_best_effort(
                &sender,
                &event.platform,
                &format!("{SELF_TAG} Session reset. Context cleared."),
            )
            .await;
        return RouteOutcome::Reset;
    }

    // A long-running worker may be waiting on this user: the next inbound
    // message is its answer, not a fresh turn.
    if state.questions.pending(&session_id).is_some() {
        state.questions.answer(&session_id, &body);
        if !event.from_me {
            state
                .bridge
                .send_text_best_effort(
                    &sender,
                    &event.platform,
                    &format!("{SELF_TAG} Got it — continuing the task with your answer: \"{body}\""),
                )
                .await;
        }
        return RouteOutcome::QuestionAnswered;
    }

    let sender_name = event.sender_name.as_deref().unwrap_or("Unknown");
    let wrapped = format!("[{sender_name} ({sender})]: {body}");

    // Keep the user's typing indicator alive for the whole turn.
    let typing = TypingHandle::start(
        Arc::clone(&state.bridge),
        sender.clone(),
        event.platform.clone(),
    );

    let result = run_turn_quiet(&state, &session_id, &event.platform, &wrapped).await;
    typing.stop();

    let outcome = match result {
        Ok(reply) => {
            if !reply.trim().is_empty() {
                state
                    .bridge
                    .send_text_best_effort(
                        &sender,
                        &event.platform,
                        &format!("{SELF_TAG} {reply}"),
                    )
                    .await;
            }
            RouteOutcome::Processed
        }
        Err(e) => {
            error!(session = %session_id, error = %e, "engine turn failed");
            RouteOutcome::EngineError
        }
    };

    if event.platform == "whatsapp" {
        let _ = state.bridge.stop_typing(&sender, &event.platform).await;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use otto_channels::{BridgeClient, PendingQuestions};
    use otto_core::config::OttoConfig;
    use otto_llm::{
        ChatRequest, ChatResponse, LlmProvider, ProviderError, StreamEvent,
    };
    use otto_memory::MemoryStore;
    use otto_scheduler::CronStore;
    use otto_sessions::HistoryStore;
    use otto_vision::{CommandDriver, VisionDeps, VisionHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Provider that streams a fixed reply and counts invocations.
    struct CountingProvider {
        reply: String,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.reply.clone(),
                stop_reason: "stop".into(),
                tool_calls: vec![],
            })
        }
        async fn send_stream(
            &self,
            _req: &ChatRequest,
            tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = tx
                .send(StreamEvent::TextDelta {
                    text: self.reply.clone(),
                })
                .await;
            let _ = tx
                .send(StreamEvent::Done {
                    stop_reason: "stop".into(),
                })
                .await;
            Ok(())
        }
    }

    struct Fixture {
        state: Arc<AppState>,
        provider: Arc<CountingProvider>,
        _tmp: tempfile::TempDir,
    }

    fn fixture(reply: &str, allowed: Vec<String>) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = OttoConfig::default();
        config.work_dir = tmp.path().to_string_lossy().into_owned();
        config.whatsapp.allowed_numbers = allowed;

        let provider = CountingProvider::new(reply);
        let bridge = Arc::new(BridgeClient::new("http://127.0.0.1:1"));
        let questions = Arc::new(PendingQuestions::new());
        let vision = VisionHandle::new(VisionDeps {
            provider: provider.clone(),
            bridge: Arc::clone(&bridge),
            questions: Arc::clone(&questions),
            driver: Arc::new(CommandDriver::new()),
            model: "test".into(),
            screenshots_dir: tmp.path().to_path_buf(),
        });
        let (fired_tx, _fired_rx) = mpsc::channel(8);

        let state = Arc::new(AppState::new(
            config,
            HistoryStore::open_in_memory().unwrap(),
            MemoryStore::new(tmp.path()),
            bridge,
            questions,
            Arc::new(CronStore::open_in_memory().unwrap()),
            vision,
            provider.clone(),
            fired_tx,
        ));
        Fixture {
            state,
            provider,
            _tmp: tmp,
        }
    }

    fn event(message_id: Option<&str>, from: &str, body: &str, platform: &str) -> InboundEvent {
        InboundEvent {
            message_id: message_id.map(String::from),
            from: Some(from.to_string()),
            body: Some(body.to_string()),
            sender_name: Some("Ada".to_string()),
            from_me: false,
            platform: platform.to_string(),
        }
    }

    #[tokio::test]
    async fn simple_turn_persists_and_replies() {
        let f = fixture("Hi there.", vec![]);
        let outcome =
            route_inbound(f.state.clone(), event(Some("m1"), "u1", "hello", "mx")).await;
        assert_eq!(outcome, RouteOutcome::Processed);
        assert_eq!(f.provider.calls(), 1);

        let history = f.state.history.load("u1", None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content.as_deref(), Some("[Ada (u1)]: hello"));
        assert_eq!(history[1].content.as_deref(), Some("Hi there."));
    }

    #[tokio::test]
    async fn duplicate_message_id_runs_the_engine_once() {
        let f = fixture("Hi.", vec![]);
        let first =
            route_inbound(f.state.clone(), event(Some("m1"), "u1", "hello", "mx")).await;
        let second =
            route_inbound(f.state.clone(), event(Some("m1"), "u1", "hello", "mx")).await;
        assert_eq!(first, RouteOutcome::Processed);
        assert_eq!(second, RouteOutcome::IgnoredDuplicate);
        assert_eq!(f.provider.calls(), 1);
    }

    #[tokio::test]
    async fn self_tagged_messages_are_dropped_without_engine_invocation() {
        let f = fixture("Hi.", vec![]);
        let outcome = route_inbound(
            f.state.clone(),
            event(Some("m2"), "u1", &format!("{SELF_TAG} Hi there."), "mx"),
        )
        .await;
        assert_eq!(outcome, RouteOutcome::IgnoredLoopPrevent);
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn whatsapp_allow_list_blocks_unknown_senders() {
        let f = fixture("Hi.", vec!["111".to_string()]);
        let blocked = route_inbound(
            f.state.clone(),
            event(Some("m3"), "222@c.us", "hello", "whatsapp"),
        )
        .await;
        assert_eq!(blocked, RouteOutcome::IgnoredUnauthorized);

        let allowed = route_inbound(
            f.state.clone(),
            event(Some("m4"), "111@c.us", "hello", "whatsapp"),
        )
        .await;
        assert_eq!(allowed, RouteOutcome::Processed);

        // The allow-list never applies to other platforms.
        let other = route_inbound(
            f.state.clone(),
            event(Some("m5"), "anyone", "hello", "api"),
        )
        .await;
        assert_eq!(other, RouteOutcome::Processed);
    }

    #[tokio::test]
    async fn reset_command_clears_history_without_an_engine_turn() {
        let f = fixture("Hi.", vec![]);
        route_inbound(f.state.clone(), event(Some("m1"), "u1", "hello", "mx")).await;
        assert!(!f.state.history.load("u1", None).unwrap().is_empty());

        let outcome =
            route_inbound(f.state.clone(), event(Some("m2"), "u1", "/reset", "mx")).await;
        assert_eq!(outcome, RouteOutcome::Reset);
        assert!(f.state.history.load("u1", None).unwrap().is_empty());
        assert_eq!(f.provider.calls(), 1);
    }

    #[tokio::test]
    async fn pending_question_consumes_the_next_inbound_message() {
        let f = fixture("Hi.", vec![]);

        let questions = Arc::clone(&f.state.questions);
        let waiter =
            tokio::spawn(async move { questions.ask("u1", "Which file?").await });
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let outcome =
            route_inbound(f.state.clone(), event(Some("m1"), "u1", "file.txt", "mx")).await;
        assert_eq!(outcome, RouteOutcome::QuestionAnswered);
        assert_eq!(waiter.await.unwrap().as_deref(), Some("file.txt"));
        // No engine turn was started for the answer.
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn events_without_sender_or_body_are_ignored() {
        let f = fixture("Hi.", vec![]);
        let outcome = route_inbound(
            f.state.clone(),
            InboundEvent {
                message_id: None,
                from: None,
                body: None,
                sender_name: None,
                from_me: false,
                platform: "mx".into(),
            },
        )
        .await;
        assert_eq!(outcome, RouteOutcome::Ignored);
    }

    #[test]
    fn processed_set_detects_replays() {
        let p = ProcessedMessages::new();
        assert!(p.insert("m1"));
        assert!(!p.insert("m1"));
        assert!(p.insert("m2"));
    }

    #[test]
    fn processed_set_clears_wholesale_at_cap() {
        let p = ProcessedMessages::new();
        for i in 0..PROCESSED_CAP {
            assert!(p.insert(&format!("m{i}")));
        }
        // The next insert clears the set, so an old id becomes fresh again.
        assert!(p.insert("overflow"));
        assert!(p.insert("m0"));
    }

    #[test]
    fn inbound_event_decodes_bridge_payloads() {
        let ev: InboundEvent = serde_json::from_value(serde_json::json!({
            "message_id": "m1",
            "from": "u1",
            "body": "hello",
            "senderName": "Ada",
            "fromMe": false,
            "platform": "mx"
        }))
        .unwrap();
        assert_eq!(ev.from.as_deref(), Some("u1"));
        assert_eq!(ev.sender_name.as_deref(), Some("Ada"));
        assert_eq!(ev.platform, "mx");

        // Platform defaults to whatsapp when the bridge omits it.
        let ev: InboundEvent =
            serde_json::from_value(serde_json::json!({"from": "u1", "body": "hi"})).unwrap();
        assert_eq!(ev.platform, "whatsapp");
    }
}
