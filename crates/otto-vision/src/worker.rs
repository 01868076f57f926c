//! The worker actor: one task owns the screen, goals queue FIFO, corrections
//! jump straight into the next perceive/plan cycle.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use otto_channels::{BridgeClient, MediaKind, OutboundMessage, PendingQuestions};
use otto_core::SELF_TAG;
use otto_llm::{ChatRequest, LlmProvider, WireMessage};
use tracing::{error, info, warn};

use crate::actions::{bbox_center_pixels, parse_plan, point_pixels, Action, PlannedStep, ScrollDirection};
use crate::error::{Result, VisionError};
use crate::screen::{MouseButton, ScreenDriver, Screenshot};

const INITIAL_STEP_LIMIT: usize = 15;
/// Settle pause between executed actions.
const STEP_PAUSE_MS: u64 = 1500;
/// Pause between individual wheel notches.
const SCROLL_NOTCH_PAUSE_MS: u64 = 100;
/// Consecutive unparseable plans before the goal is abandoned.
const PLAN_RETRY_LIMIT: usize = 3;
/// Pointer animation duration for click-class actions.
const MOVE_DURATION_MS: u64 = 500;

const VISION_SYSTEM_PROMPT: &str = r#"You control a computer through the screen to achieve a goal.
You operate in a plan-work-loop cycle: analyze the screenshot, plan the next
1-5 actions, execute them, then re-evaluate with a fresh screenshot.

Coordinate system: the screen is normalized to 0-1000 on both axes, top-left
is (0, 0). To click an element, return its bounding box as
[ymin, xmin, ymax, xmax].

Available actions:
1. CLICK - left click on an element (requires "bbox")
2. DOUBLE_CLICK - double left click (requires "bbox")
3. RIGHT_CLICK - right click (requires "bbox")
4. TYPE - type text (requires "text")
5. HOTKEY - press a key combination (requires "keys", e.g. ["ctrl", "v"])
6. SCROLL - scroll (optional "direction": "up"|"down", "amount")
7. MOVE_TO - move the pointer (requires "point": [x, y])
8. WAIT - pause (optional "duration" in seconds)
9. ASK_USER - ask the user for help (requires "question")
10. FINISH - the goal succeeded or cannot proceed (optional "reason")

Respond with a raw JSON array of action objects, each with an optional
"thought". No markdown fences, no prose outside the JSON."#;

/// Everything the worker needs to run, injected once at construction.
pub struct VisionDeps {
    pub provider: Arc<dyn LlmProvider>,
    pub bridge: Arc<BridgeClient>,
    pub questions: Arc<PendingQuestions>,
    pub driver: Arc<dyn ScreenDriver>,
    pub model: String,
    pub screenshots_dir: PathBuf,
}

struct Shared {
    goals: Mutex<VecDeque<String>>,
    feedback: Mutex<VecDeque<String>>,
    /// True while a goal is being worked.
    busy: AtomicBool,
    /// Set to abandon the current goal between actions.
    cancel: AtomicBool,
    /// Session and platform the worker reports back to.
    origin: Mutex<Option<(String, String)>>,
}

/// Public face of the singleton. At most one worker task exists per process;
/// every caller goes through [`VisionHandle::submit`].
pub struct VisionHandle {
    deps: Arc<VisionDeps>,
    shared: Arc<Shared>,
    started: Mutex<bool>,
}

impl VisionHandle {
    pub fn new(deps: VisionDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            shared: Arc::new(Shared {
                goals: Mutex::new(VecDeque::new()),
                feedback: Mutex::new(VecDeque::new()),
                busy: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                origin: Mutex::new(None),
            }),
            started: Mutex::new(false),
        }
    }

    /// Submit a goal or a correction. Starts the worker on first use; while
    /// the worker is running, normal goals queue FIFO and corrections go to
    /// the feedback queue that is drained at the next plan cycle.
    pub fn submit(&self, goal: &str, is_correction: bool, session_id: &str, platform: &str) -> String {
        let mut started = self.started.lock().unwrap();

        if !*started {
            *self.shared.origin.lock().unwrap() =
                Some((session_id.to_string(), platform.to_string()));
            self.shared.goals.lock().unwrap().push_back(goal.to_string());
            self.shared.busy.store(true, Ordering::SeqCst);

            let deps = Arc::clone(&self.deps);
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { run_worker(deps, shared).await });

            *started = true;
            info!(goal, "vision worker started");
            return format!("Vision worker started. Goal '{goal}' is processing in the background.");
        }

        if is_correction {
            self.shared
                .feedback
                .lock()
                .unwrap()
                .push_back(goal.to_string());
            info!(goal, "vision correction queued");
            format!("Correction injected: '{goal}'")
        } else {
            let mut goals = self.shared.goals.lock().unwrap();
            goals.push_back(goal.to_string());
            info!(goal, position = goals.len(), "vision goal queued");
            format!("Goal '{goal}' queued. Position in queue: {}", goals.len())
        }
    }

    /// True while a goal is running or queued. Feeds the Heartbeat gate.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst) || !self.shared.goals.lock().unwrap().is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.goals.lock().unwrap().len()
    }

    /// Probe the logical screen size through the driver.
    pub async fn screen_size(&self) -> Option<(u32, u32)> {
        self.deps.driver.screen_size().await.ok()
    }

    /// Best-effort teardown for a session's vision work: drops queued goals
    /// and flags the in-flight goal for abandonment at the next action
    /// boundary. Returns `false` when the worker belongs to another session.
    pub fn request_teardown(&self, session_id: &str) -> bool {
        let origin = self.shared.origin.lock().unwrap();
        match origin.as_ref() {
            Some((owner, _)) if owner == session_id => {
                self.shared.goals.lock().unwrap().clear();
                self.shared.cancel.store(true, Ordering::SeqCst);
                warn!(session = %session_id, "vision teardown requested");
                true
            }
            _ => false,
        }
    }
}

async fn run_worker(deps: Arc<VisionDeps>, shared: Arc<Shared>) {
    info!("vision worker loop running");
    loop {
        let goal = shared.goals.lock().unwrap().pop_front();
        let Some(goal) = goal else {
            shared.busy.store(false, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        };

        shared.busy.store(true, Ordering::SeqCst);
        shared.cancel.store(false, Ordering::SeqCst);

        let (session, platform) = shared
            .origin
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ("default".to_string(), "api".to_string()));

        info!(goal = %goal, "starting vision goal");
        if let Err(e) = run_goal(&deps, &shared, &goal, &session, &platform).await {
            error!(goal = %goal, error = %e, "vision goal failed");
            notify(&deps, &session, &platform, &format!("Goal failed: {e}")).await;
        }
    }
}

enum StepOutcome {
    Acted(String),
    Finished(String),
}

async fn run_goal(
    deps: &VisionDeps,
    shared: &Shared,
    goal: &str,
    session: &str,
    platform: &str,
) -> Result<()> {
    let mut step_count: usize = 0;
    let mut step_limit = INITIAL_STEP_LIMIT;
    let mut history: Vec<String> = Vec::new();
    let mut plan_failures = 0;
    let mut checkpoint_due = false;

    while step_count < step_limit {
        if shared.cancel.load(Ordering::SeqCst) {
            notify(deps, session, platform, &format!("Goal '{goal}' cancelled.")).await;
            return Ok(());
        }

        let shot = capture_logical(deps).await?;

        // Corrections apply at the cycle boundary, never mid-action.
        let feedback: Vec<String> = shared.feedback.lock().unwrap().drain(..).collect();

        let mut prompt = format!("GOAL: {goal}\n\nHistory: {history:?}\n");
        if !feedback.is_empty() {
            prompt.push_str("\n[USER CORRECTION]: ");
            prompt.push_str(&feedback.join("\n- "));
        }
        if checkpoint_due {
            prompt.push_str(
                "\n[CHECKPOINT] Reflect on progress so far, re-plan, and adjust the approach if stuck.",
            );
            checkpoint_due = false;
        }

        let b64 = base64::engine::general_purpose::STANDARD.encode(&shot.png);
        let messages = vec![
            WireMessage::system(VISION_SYSTEM_PROMPT),
            WireMessage {
                role: "user".into(),
                content: Some(serde_json::json!([
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": format!("data:image/png;base64,{b64}") } }
                ])),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            },
        ];

        let resp = deps
            .provider
            .send(&ChatRequest::new(deps.model.clone(), messages))
            .await?;

        let plan = parse_plan(&resp.content);
        if plan.is_empty() {
            plan_failures += 1;
            if plan_failures >= PLAN_RETRY_LIMIT {
                return Err(VisionError::Plan(format!(
                    "model produced no parseable plan after {PLAN_RETRY_LIMIT} attempts"
                )));
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            continue;
        }
        plan_failures = 0;

        info!(actions = plan.len(), "executing vision plan");
        for step in &plan {
            if step_count >= step_limit {
                break;
            }
            step_count += 1;

            let outcome = execute_step(deps, step, &shot, session, platform).await?;
            match outcome {
                StepOutcome::Finished(reason) => {
                    info!(goal = %goal, %reason, "vision goal finished");
                    notify(
                        deps,
                        session,
                        platform,
                        &format!("Goal completed: {goal}\nResult: {reason}"),
                    )
                    .await;
                    return Ok(());
                }
                StepOutcome::Acted(result) => {
                    let thought = step.thought.as_deref().unwrap_or("-");
                    history.push(format!("Step {step_count}: {thought} => {result}"));
                }
            }

            // Long goals earn extra budget at each checkpoint.
            if step_count % 5 == 0 {
                step_limit += 5;
                checkpoint_due = true;
            }

            tokio::time::sleep(Duration::from_millis(STEP_PAUSE_MS)).await;
        }
    }

    notify(
        deps,
        session,
        platform,
        &format!("Goal '{goal}' stopped: step limit reached."),
    )
    .await;
    Ok(())
}

async fn execute_step(
    deps: &VisionDeps,
    step: &PlannedStep,
    shot: &Screenshot,
    session: &str,
    platform: &str,
) -> Result<StepOutcome> {
    let (w, h) = (shot.width, shot.height);

    let result = match &step.action {
        Action::Click { bbox } => {
            let (x, y) = bbox_center_pixels(bbox, w, h);
            deps.driver.move_to(x, y, MOVE_DURATION_MS).await?;
            deps.driver.click(MouseButton::Left).await?;
            format!("Clicked at ({x}, {y})")
        }
        Action::DoubleClick { bbox } => {
            let (x, y) = bbox_center_pixels(bbox, w, h);
            deps.driver.move_to(x, y, MOVE_DURATION_MS).await?;
            deps.driver.double_click().await?;
            format!("Double-clicked at ({x}, {y})")
        }
        Action::RightClick { bbox } => {
            let (x, y) = bbox_center_pixels(bbox, w, h);
            deps.driver.move_to(x, y, MOVE_DURATION_MS).await?;
            deps.driver.click(MouseButton::Right).await?;
            format!("Right-clicked at ({x}, {y})")
        }
        Action::Type { text } => {
            deps.driver.type_text(text).await?;
            format!("Typed: '{text}'")
        }
        Action::Hotkey { keys } => {
            deps.driver.hotkey(keys).await?;
            format!("Keys pressed: {keys:?}")
        }
        Action::Scroll { direction, amount } => {
            let up = *direction == ScrollDirection::Up;
            for _ in 0..*amount {
                deps.driver.scroll_notch(up).await?;
                tokio::time::sleep(Duration::from_millis(SCROLL_NOTCH_PAUSE_MS)).await;
            }
            format!("Scrolled {direction:?} by {amount} notches")
        }
        Action::MoveTo { point } => {
            let (x, y) = point_pixels(point, w, h);
            deps.driver.move_to(x, y, MOVE_DURATION_MS).await?;
            format!("Moved cursor to ({x}, {y})")
        }
        Action::Wait { duration } => {
            tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0))).await;
            format!("Waited {duration}s")
        }
        Action::AskUser { question } => {
            let answer = ask_user(deps, question, shot, session, platform).await?;
            match answer {
                Some(text) => format!("User responded: {text}"),
                None => "[TIMEOUT] No user response received".to_string(),
            }
        }
        Action::Finish { reason } => {
            return Ok(StepOutcome::Finished(
                reason.clone().unwrap_or_else(|| "Done".to_string()),
            ));
        }
    };

    Ok(StepOutcome::Acted(result))
}

/// Send the current screenshot with the question, then block on the
/// pending-question mailbox until the router delivers the user's reply.
async fn ask_user(
    deps: &VisionDeps,
    question: &str,
    shot: &Screenshot,
    session: &str,
    platform: &str,
) -> Result<Option<String>> {
    let filename = format!("vision_{}.png", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let path = deps.screenshots_dir.join(filename);
    tokio::fs::write(&path, &shot.png).await?;

    let caption = format!("{SELF_TAG} Task paused: {question}\nReply to continue.");
    let media = OutboundMessage::media(
        session,
        platform,
        path.to_string_lossy().into_owned(),
        MediaKind::Image,
        Some(caption),
    );
    if let Err(e) = deps.bridge.send(&media).await {
        warn!(error = %e, "failed to deliver vision question screenshot");
    }

    info!(question, session, "vision worker waiting on user input");
    Ok(deps.questions.ask(session, question).await)
}

/// Capture the screen and rescale to the logical size when physical pixels
/// differ (HiDPI displays).
async fn capture_logical(deps: &VisionDeps) -> Result<Screenshot> {
    let shot = deps.driver.capture().await?;
    let (lw, lh) = deps.driver.screen_size().await?;
    if (shot.width, shot.height) == (lw, lh) {
        return Ok(shot);
    }

    let img = image::load_from_memory(&shot.png).map_err(|e| VisionError::Image(e.to_string()))?;
    let resized = img.resize_exact(lw, lh, image::imageops::FilterType::Lanczos3);
    let mut png = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| VisionError::Image(e.to_string()))?;
    Ok(Screenshot {
        png,
        width: lw,
        height: lh,
    })
}

async fn notify(deps: &VisionDeps, session: &str, platform: &str, message: &str) {
    let mut text = message.to_string();
    if text.len() > 1500 {
        text.truncate(1500);
        text.push_str("...[truncated]");
    }
    deps.bridge
        .send_text_best_effort(session, platform, &format!("{SELF_TAG} [vision] {text}"))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use otto_llm::{ChatResponse, ProviderError, StreamEvent};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    struct MockDriver {
        scroll_up: AtomicUsize,
        scroll_down: AtomicUsize,
        clicks: AtomicUsize,
        png: Vec<u8>,
    }

    impl MockDriver {
        fn new() -> Self {
            let img = image::DynamicImage::new_rgb8(16, 16);
            let mut png = Vec::new();
            img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
                .unwrap();
            Self {
                scroll_up: AtomicUsize::new(0),
                scroll_down: AtomicUsize::new(0),
                clicks: AtomicUsize::new(0),
                png,
            }
        }
    }

    #[async_trait]
    impl ScreenDriver for MockDriver {
        async fn screen_size(&self) -> Result<(u32, u32)> {
            Ok((16, 16))
        }
        async fn capture(&self) -> Result<Screenshot> {
            Ok(Screenshot {
                png: self.png.clone(),
                width: 16,
                height: 16,
            })
        }
        async fn move_to(&self, _x: u32, _y: u32, _ms: u64) -> Result<()> {
            Ok(())
        }
        async fn click(&self, _b: MouseButton) -> Result<()> {
            self.clicks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn double_click(&self) -> Result<()> {
            Ok(())
        }
        async fn type_text(&self, _t: &str) -> Result<()> {
            Ok(())
        }
        async fn hotkey(&self, _k: &[String]) -> Result<()> {
            Ok(())
        }
        async fn scroll_notch(&self, up: bool) -> Result<()> {
            if up {
                self.scroll_up.fetch_add(1, Ordering::SeqCst);
            } else {
                self.scroll_down.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct MockProvider {
        responses: Mutex<VecDeque<String>>,
        delay_ms: u64,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }
        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| r#"[{"action": "FINISH", "reason": "done"}]"#.to_string());
            Ok(ChatResponse {
                content,
                stop_reason: "stop".into(),
                tool_calls: vec![],
            })
        }
        async fn send_stream(
            &self,
            _req: &ChatRequest,
            tx: mpsc::Sender<StreamEvent>,
        ) -> std::result::Result<(), ProviderError> {
            let _ = tx
                .send(StreamEvent::Done {
                    stop_reason: "stop".into(),
                })
                .await;
            Ok(())
        }
    }

    fn handle_with(responses: Vec<&str>, delay_ms: u64) -> (VisionHandle, Arc<MockDriver>) {
        let driver = Arc::new(MockDriver::new());
        let tmp = std::env::temp_dir();
        let handle = VisionHandle::new(VisionDeps {
            provider: Arc::new(MockProvider {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
                delay_ms,
            }),
            bridge: Arc::new(BridgeClient::new("http://127.0.0.1:1")),
            questions: Arc::new(PendingQuestions::new()),
            driver: Arc::clone(&driver) as Arc<dyn ScreenDriver>,
            model: "mock-vision".into(),
            screenshots_dir: tmp,
        });
        (handle, driver)
    }

    #[tokio::test]
    async fn scroll_emits_one_notch_per_amount() {
        let (handle, driver) = handle_with(
            vec![r#"[
                {"action": "SCROLL", "direction": "down", "amount": 4},
                {"action": "FINISH", "reason": "scrolled"}
            ]"#],
            0,
        );
        handle.submit("scroll the page", false, "u1", "whatsapp");

        // Scroll notches (4 x 100ms) + step pause; poll until done.
        for _ in 0..80 {
            if driver.scroll_down.load(Ordering::SeqCst) == 4 && !handle.is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(driver.scroll_down.load(Ordering::SeqCst), 4);
        assert_eq!(driver.scroll_up.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_while_busy_queues_the_goal() {
        // A slow provider keeps the first goal in flight.
        let (handle, _driver) = handle_with(vec![], 3_000);
        handle.submit("first goal", false, "u1", "whatsapp");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_busy());

        let before = handle.queue_len();
        let status = handle.submit("second goal", false, "u1", "whatsapp");
        assert_eq!(handle.queue_len(), before + 1);
        assert!(status.contains("queued"));
    }

    #[tokio::test]
    async fn corrections_go_to_the_feedback_queue() {
        let (handle, _driver) = handle_with(vec![], 3_000);
        handle.submit("first goal", false, "u1", "whatsapp");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let before = handle.queue_len();
        let status = handle.submit("no, the other window", true, "u1", "whatsapp");
        // Corrections never consume goal-queue slots.
        assert_eq!(handle.queue_len(), before);
        assert!(status.contains("Correction injected"));
    }

    #[tokio::test]
    async fn teardown_only_applies_to_the_owning_session() {
        let (handle, _driver) = handle_with(vec![], 3_000);
        handle.submit("first goal", false, "u1", "whatsapp");
        handle.submit("second goal", false, "u1", "whatsapp");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.request_teardown("someone-else"));
        assert!(handle.request_teardown("u1"));
        assert_eq!(handle.queue_len(), 0);
    }
}
