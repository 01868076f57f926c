//! One tool per mutable memory blob: user facts, personality, subconscious,
//! and the time-bounded conscious focus.

use async_trait::async_trait;
use otto_memory::MemoryKind;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

macro_rules! blob_tool {
    ($tool:ident, $tool_name:literal, $kind:expr, $desc:literal, $ok:literal) => {
        pub struct $tool<C: TurnContext> {
            t: ToolCtx<C>,
        }

        impl<C: TurnContext> $tool<C> {
            pub fn new(t: ToolCtx<C>) -> Self {
                Self { t }
            }
        }

        #[async_trait]
        impl<C: TurnContext> Tool for $tool<C> {
            fn name(&self) -> &str {
                $tool_name
            }

            fn description(&self) -> &str {
                $desc
            }

            fn parameters(&self) -> serde_json::Value {
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "content": {
                            "type": "string",
                            "description": "The full new content of the memory blob."
                        }
                    },
                    "required": ["content"]
                })
            }

            async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
                let content = match require_str(&args, "content") {
                    Ok(c) => c,
                    Err(out) => return out,
                };
                match self.t.ctx.memory().write($kind, content) {
                    Ok(()) => ToolOutcome::success($ok),
                    Err(e) => ToolOutcome::error(format!("memory write failed: {e}")),
                }
            }
        }
    };
}

blob_tool!(
    UpdateUserMemoryTool,
    "update_user_memory",
    MemoryKind::User,
    "Update persistent memory about the user: preferences, key facts, long-term details.",
    "User memory updated."
);

blob_tool!(
    UpdatePersonalityTool,
    "update_personality",
    MemoryKind::Personality,
    "Update your own persistent personality, emotional state, and internal rules.",
    "Personality updated."
);

blob_tool!(
    UpdateSubconsciousTool,
    "update_subconscious",
    MemoryKind::Subconscious,
    "Store ideas, error patterns, lessons learned, or experimental plans for future autonomous work.",
    "Subconscious updated."
);

/// Sets the short-horizon focus with its expiry window.
pub struct SetConsciousFocusTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> SetConsciousFocusTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for SetConsciousFocusTool<C> {
    fn name(&self) -> &str {
        "set_conscious_focus"
    }

    fn description(&self) -> &str {
        "Set your current short-horizon focus. It expires automatically after \
         the given duration (capped at 15 minutes)."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "focus": {
                    "type": "string",
                    "description": "What you are working on right now."
                },
                "duration_minutes": {
                    "type": "integer",
                    "description": "Minutes until the focus expires (default 10)."
                }
            },
            "required": ["focus"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let focus = match require_str(&args, "focus") {
            Ok(f) => f,
            Err(out) => return out,
        };
        let duration = args
            .get("duration_minutes")
            .and_then(|v| v.as_i64())
            .unwrap_or(10);
        match self.t.ctx.memory().set_focus(focus, duration) {
            Ok(()) => ToolOutcome::success(format!(
                "Conscious focus set for {} minutes.",
                duration.clamp(1, otto_memory::store::MAX_FOCUS_MINUTES)
            )),
            Err(e) => ToolOutcome::error(format!("memory write failed: {e}")),
        }
    }
}
