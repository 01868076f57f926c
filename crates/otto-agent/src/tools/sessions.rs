//! `create_session` — open an independent child session under the current one.

use async_trait::async_trait;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

pub struct CreateSessionTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> CreateSessionTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for CreateSessionTool<C> {
    fn name(&self) -> &str {
        "create_session"
    }

    fn description(&self) -> &str {
        "Create a new independent session (a child of the current one)."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Identifier for the new session. No spaces."
                }
            },
            "required": ["session_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let session_id = match require_str(&args, "session_id") {
            Ok(s) => s,
            Err(out) => return out,
        };
        if session_id.trim().is_empty() || session_id.contains(char::is_whitespace) {
            return ToolOutcome::error("session_id must be non-empty and contain no spaces");
        }

        match self
            .t
            .ctx
            .history()
            .create(session_id, Some(&self.t.session_id))
        {
            Ok(true) => ToolOutcome::success(format!("Session '{session_id}' created.")),
            Ok(false) => ToolOutcome::success(format!("Session '{session_id}' already exists.")),
            Err(e) => ToolOutcome::error(format!("could not create session: {e}")),
        }
    }
}
