//! LLM client — an OpenAI-compatible chat-completions interface with
//! streaming tool-call support.
//!
//! The conversation engine is the only streaming caller; the vision worker
//! uses the non-streaming path. Provider differences stay behind
//! [`provider::LlmProvider`].

pub mod openai;
pub mod provider;
pub mod stream;

pub use provider::{
    ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall, ToolDefinition, WireMessage,
};
pub use stream::StreamEvent;
