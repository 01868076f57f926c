//! The agent runtime: the streaming conversation engine, the tool catalogue,
//! and the sub-agent supervisor.
//!
//! Tools never reach into engine internals — they see only the
//! [`context::TurnContext`] capability trait, which the gateway's shared
//! state implements. That keeps the engine/tool dependency one-directional.

pub mod context;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod supervisor;
pub mod tools;

pub use context::TurnContext;
pub use engine::{run_turn, EngineEvent};
pub use error::{EngineError, Result};
pub use supervisor::{SubAgentManager, SubAgentStatus};
