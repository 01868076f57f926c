//! The conversation engine — one turn of the think → act loop.
//!
//! Flow: persist the user message → stream the LLM response, forwarding text
//! chunks as they arrive and assembling tool-call fragments by index →
//! persist assistant output → execute tool calls in order → feed results
//! back → iterate until the model stops calling tools.
//!
//! Stream-open failures retry up to three times with a short backoff;
//! mid-stream failures end the turn. Three consecutive tool failures inside
//! a batch trip a halt-and-reflect message that forces the model to analyze
//! before resuming.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use otto_llm::{ChatRequest, StreamEvent, WireMessage};
use otto_sessions::StoredMessage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::TurnContext;
use crate::error::EngineError;
use crate::prompt::build_system_prompt;
use crate::tools::{build_tools, to_definitions, Tool, ToolOutcome};

/// Stream-open attempts before the turn fails.
const OPEN_ATTEMPTS: u32 = 3;
/// Backoff between open attempts.
const RETRY_BACKOFF_SECS: u64 = 2;
/// Consecutive tool failures that trip the halt.
const FAILURE_HALT_THRESHOLD: u32 = 3;
/// Display truncation for tool results in status lines.
const RESULT_DISPLAY_CHARS: usize = 500;

const HALT_PROMPT: &str = "[SYSTEM HALT - TOO MANY FAILURES]\n\
Three tool calls in a row have failed. Execution of this batch is stopped.\n\n\
Required next steps:\n\
1. Stop retrying blindly.\n\
2. Analyze the last three errors step by step.\n\
3. Identify the root cause (syntax? permissions? wrong tool? missing dependency?).\n\
4. Plan a corrected approach, then resume with the new plan.";

/// Events surfaced to the caller while a turn runs.
///
/// The visible reply is exactly the concatenation of `TextChunk` payloads;
/// everything else is progress narration.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TextChunk(String),
    Status(String),
    ToolStart { name: String, arguments: String },
    ToolResult { name: String, result: String },
    Error(String),
}

/// A tool call under assembly from streamed fragments.
#[derive(Debug, Default, Clone)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingCall {
    fn to_openai_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "type": "function",
            "function": { "name": self.name, "arguments": self.arguments }
        })
    }
}

/// Run one full conversation turn for a session.
///
/// Returns the final visible reply (all text chunks concatenated). Events
/// stream through `events` as the turn progresses; the caller decides what
/// to show and what to drop.
pub async fn run_turn<C: TurnContext>(
    ctx: &Arc<C>,
    session_id: &str,
    platform: &str,
    user_text: &str,
    events: &mpsc::Sender<EngineEvent>,
) -> Result<String, EngineError> {
    ctx.history().create(session_id, None)?;
    ctx.history()
        .append(session_id, &StoredMessage::user(user_text))?;

    let tools = build_tools(Arc::clone(ctx), session_id, platform);
    let tool_defs = to_definitions(&tools);

    let mut reply = String::new();

    loop {
        let system = build_system_prompt(ctx.memory())?;
        let history = ctx.history().load(session_id, None)?;
        let mut messages = vec![WireMessage::system(system)];
        messages.extend(history.iter().map(stored_to_wire));

        let mut request = ChatRequest::new(ctx.model(), messages);
        request.tools = tool_defs.clone();

        let streamed = stream_once(ctx, &request, events, &mut reply).await?;

        if !streamed.text.is_empty() {
            ctx.history()
                .append(session_id, &StoredMessage::assistant(&streamed.text))?;
        }

        if let Some(message) = streamed.error {
            // Mid-stream failure: the turn ends, but nothing already emitted
            // is discarded.
            let _ = events.send(EngineEvent::Error(message)).await;
            return Ok(reply);
        }

        if streamed.calls.is_empty() {
            break;
        }

        let call_values: Vec<serde_json::Value> =
            streamed.calls.iter().map(|c| c.to_openai_value()).collect();
        ctx.history()
            .append(session_id, &StoredMessage::assistant_tool_calls(call_values))?;

        let any_executed =
            execute_batch(ctx, session_id, &streamed.calls, &tools, events).await?;

        if !any_executed {
            break;
        }
    }

    info!(session = %session_id, chars = reply.len(), "turn complete");
    Ok(reply)
}

struct StreamedResponse {
    text: String,
    calls: Vec<PendingCall>,
    /// Set when the stream died after opening.
    error: Option<String>,
}

/// Open the LLM stream (retrying open failures) and consume it fully.
async fn stream_once<C: TurnContext>(
    ctx: &Arc<C>,
    request: &ChatRequest,
    events: &mpsc::Sender<EngineEvent>,
    reply: &mut String,
) -> Result<StreamedResponse, EngineError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(256);
        let provider = ctx.provider();
        let req = request.clone();
        let task = tokio::spawn(async move { provider.send_stream(&req, tx).await });

        let mut text = String::new();
        let mut calls: Vec<PendingCall> = Vec::new();
        let mut error = None;
        let mut received_any = false;

        while let Some(event) = rx.recv().await {
            received_any = true;
            match event {
                StreamEvent::TextDelta { text: delta } => {
                    text.push_str(&delta);
                    reply.push_str(&delta);
                    let _ = events.send(EngineEvent::TextChunk(delta)).await;
                }
                StreamEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    while calls.len() <= index {
                        calls.push(PendingCall::default());
                    }
                    let call = &mut calls[index];
                    if let Some(id) = id {
                        call.id = id;
                    }
                    if let Some(name) = name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
                StreamEvent::Done { stop_reason } => {
                    debug!(%stop_reason, "stream done");
                    break;
                }
                StreamEvent::Error { message } => {
                    error = Some(message);
                    break;
                }
            }
        }

        let open_result = task
            .await
            .unwrap_or_else(|e| Err(otto_llm::ProviderError::Parse(e.to_string())));

        match open_result {
            Err(e) if !received_any => {
                if attempt >= OPEN_ATTEMPTS {
                    let _ = events
                        .send(EngineEvent::Error(format!(
                            "LLM connection failed after {OPEN_ATTEMPTS} attempts: {e}"
                        )))
                        .await;
                    return Err(EngineError::Transport(e.to_string()));
                }
                warn!(attempt, error = %e, "stream open failed, retrying");
                let _ = events
                    .send(EngineEvent::Status(format!(
                        "[System] Connection hiccup ({e}). Retrying {attempt}/{OPEN_ATTEMPTS}..."
                    )))
                    .await;
                tokio::time::sleep(Duration::from_secs(RETRY_BACKOFF_SECS)).await;
                continue;
            }
            Err(e) => {
                // The transport failed after events flowed — not retried.
                return Ok(StreamedResponse {
                    text,
                    calls,
                    error: Some(e.to_string()),
                });
            }
            Ok(()) => {
                // Drop half-assembled calls with no name — nothing to run.
                calls.retain(|c| !c.name.is_empty());
                return Ok(StreamedResponse { text, calls, error });
            }
        }
    }
}

/// Execute one assistant batch of tool calls in order.
///
/// Duplicate (name, argument-string) pairs are skipped; `stop_batch` skips
/// the remainder; three consecutive failures append the halt prompt and end
/// the batch. Returns whether at least one call was executed.
async fn execute_batch<C: TurnContext>(
    ctx: &Arc<C>,
    session_id: &str,
    calls: &[PendingCall],
    tools: &[Box<dyn Tool>],
    events: &mpsc::Sender<EngineEvent>,
) -> Result<bool, EngineError> {
    let mut executed: HashSet<(String, String)> = HashSet::new();
    let mut consecutive_failures = 0u32;
    let mut any_executed = false;

    for call in calls {
        let key = (call.name.clone(), call.arguments.clone());
        if executed.contains(&key) {
            let _ = events
                .send(EngineEvent::Status(format!(
                    "[System] Skipped duplicate call: {}",
                    call.name
                )))
                .await;
            continue;
        }
        executed.insert(key);

        let _ = events
            .send(EngineEvent::ToolStart {
                name: call.name.clone(),
                arguments: truncate_display(&call.arguments, RESULT_DISPLAY_CHARS),
            })
            .await;

        let outcome = dispatch(tools, call).await;
        any_executed = true;

        let _ = events
            .send(EngineEvent::ToolResult {
                name: call.name.clone(),
                result: truncate_display(&outcome.content, RESULT_DISPLAY_CHARS),
            })
            .await;

        ctx.history().append(
            session_id,
            &StoredMessage::tool_result(&call.id, &call.name, &outcome.content),
        )?;

        if is_failure_text(&outcome.content) {
            consecutive_failures += 1;
        } else {
            consecutive_failures = 0;
        }

        if consecutive_failures >= FAILURE_HALT_THRESHOLD {
            warn!(session = %session_id, "three consecutive tool failures — halting batch");
            let _ = events
                .send(EngineEvent::Status(
                    "[CRITICAL] 3 consecutive tool failures. Halting batch for analysis."
                        .to_string(),
                ))
                .await;
            ctx.history()
                .append(session_id, &StoredMessage::user(HALT_PROMPT))?;
            break;
        }

        if outcome.stop_batch {
            debug!(tool = %call.name, "tool requested stop_batch");
            break;
        }
    }

    Ok(any_executed)
}

/// Decode arguments and run the named tool. Argument and lookup errors are
/// reported back to the model as tool results, never raised.
async fn dispatch(tools: &[Box<dyn Tool>], call: &PendingCall) -> ToolOutcome {
    let raw = if call.arguments.trim().is_empty() {
        "{}"
    } else {
        call.arguments.as_str()
    };

    let args: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            return ToolOutcome::error(format!("invalid tool arguments: {e}"));
        }
    };

    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(args).await
        }
        None => ToolOutcome::error(format!("unknown tool: {}", call.name)),
    }
}

/// A tool result counts as a failure when it reads like one.
fn is_failure_text(content: &str) -> bool {
    let lower = content.to_lowercase();
    lower.contains("error") || lower.contains("failed") || lower.contains("exception")
}

fn stored_to_wire(msg: &StoredMessage) -> WireMessage {
    WireMessage {
        role: msg.role.clone(),
        content: msg.content.clone().map(serde_json::Value::String),
        tool_calls: msg.tool_calls.clone(),
        tool_call_id: msg.tool_call_id.clone(),
        name: msg.name.clone(),
    }
}

fn truncate_display(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures: a scripted provider and a fully wired context.

    use super::*;
    use crate::supervisor::SubAgentManager;
    use async_trait::async_trait;
    use otto_channels::{BridgeClient, PendingQuestions};
    use otto_llm::{ChatResponse, LlmProvider, ProviderError};
    use otto_memory::MemoryStore;
    use otto_scheduler::CronStore;
    use otto_sessions::HistoryStore;
    use otto_vision::{CommandDriver, VisionDeps, VisionHandle};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// One scripted provider turn.
    pub enum Scripted {
        /// `send_stream` returns this error without emitting events.
        OpenError(String),
        /// Emit these events, then return Ok.
        Events(Vec<StreamEvent>),
        /// Sleep first, then emit the events. For busy-state tests.
        DelayedEvents(u64, Vec<StreamEvent>),
    }

    pub struct ScriptedProvider {
        pub script: Mutex<VecDeque<Scripted>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".into(),
                stop_reason: "stop".into(),
                tool_calls: vec![],
            })
        }

        async fn send_stream(
            &self,
            _req: &ChatRequest,
            tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), ProviderError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::OpenError(msg)) => Err(ProviderError::Api {
                    status: 500,
                    message: msg,
                }),
                Some(Scripted::Events(events)) => {
                    for ev in events {
                        let _ = tx.send(ev).await;
                    }
                    Ok(())
                }
                Some(Scripted::DelayedEvents(ms, events)) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    for ev in events {
                        let _ = tx.send(ev).await;
                    }
                    Ok(())
                }
                None => {
                    let _ = tx
                        .send(StreamEvent::Done {
                            stop_reason: "stop".into(),
                        })
                        .await;
                    Ok(())
                }
            }
        }
    }

    /// Fully wired [`TurnContext`] over in-memory stores and a scripted LLM.
    pub struct TestCtx {
        pub history: HistoryStore,
        pub memory: MemoryStore,
        pub bridge: BridgeClient,
        pub questions: PendingQuestions,
        pub cron: CronStore,
        pub sub_agents: SubAgentManager,
        pub vision: VisionHandle,
        pub provider: Arc<ScriptedProvider>,
        pub skills: PathBuf,
        _tmp: tempfile::TempDir,
    }

    impl TestCtx {
        pub fn new(script: Vec<Scripted>) -> Arc<Self> {
            let tmp = tempfile::tempdir().unwrap();
            let provider = Arc::new(ScriptedProvider::new(script));
            let vision = VisionHandle::new(VisionDeps {
                provider: Arc::clone(&provider) as Arc<dyn LlmProvider>,
                bridge: Arc::new(BridgeClient::new("http://127.0.0.1:1")),
                questions: Arc::new(PendingQuestions::new()),
                driver: Arc::new(CommandDriver::new()),
                model: "test-vision".into(),
                screenshots_dir: tmp.path().to_path_buf(),
            });
            Arc::new(Self {
                history: HistoryStore::open_in_memory().unwrap(),
                memory: MemoryStore::new(tmp.path()),
                bridge: BridgeClient::new("http://127.0.0.1:1"),
                questions: PendingQuestions::new(),
                cron: CronStore::open_in_memory().unwrap(),
                sub_agents: SubAgentManager::new(),
                vision,
                provider,
                skills: tmp.path().join("skills"),
                _tmp: tmp,
            })
        }
    }

    impl TurnContext for TestCtx {
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
            &self.questions
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
            Arc::clone(&self.provider) as Arc<dyn LlmProvider>
        }
        fn model(&self) -> String {
            "test-model".into()
        }
        fn skills_dir(&self) -> PathBuf {
            self.skills.clone()
        }
        fn giphy_api_key(&self) -> Option<String> {
            None
        }
    }

    /// Collect all events from a turn alongside its result.
    pub async fn run_collect(
        ctx: &Arc<TestCtx>,
        session: &str,
        text: &str,
    ) -> (Result<String, EngineError>, Vec<EngineEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let result = run_turn(ctx, session, "test", text, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (result, events)
    }

    pub fn tool_call_event(id: &str, name: &str, args: &str) -> StreamEvent {
        StreamEvent::ToolCallDelta {
            index: 0,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: Some(args.into()),
        }
    }
}
