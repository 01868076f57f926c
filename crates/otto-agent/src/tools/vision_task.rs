//! `vision_task` — start, queue, or correct the vision worker.

use async_trait::async_trait;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

pub struct VisionTaskTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> VisionTaskTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for VisionTaskTool<C> {
    fn name(&self) -> &str {
        "vision_task"
    }

    fn description(&self) -> &str {
        "PRIMARY tool for controlling the computer screen: clicking, typing, \
         and interacting with any application or browser. Runs in the \
         background and reports back when done. Set is_correction when the \
         current task needs immediate steering."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "goal": {
                    "type": "string",
                    "description": "The goal or instruction for the vision worker."
                },
                "is_correction": {
                    "type": "boolean",
                    "default": false,
                    "description": "Treat the goal as immediate feedback for the task currently running."
                }
            },
            "required": ["goal"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let goal = match require_str(&args, "goal") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let is_correction = args
            .get("is_correction")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let status = self.t.ctx.vision().submit(
            goal,
            is_correction,
            &self.t.session_id,
            &self.t.platform,
        );
        // The worker pushes its own progress and completion messages.
        ToolOutcome::success(status).already_sent()
    }
}
