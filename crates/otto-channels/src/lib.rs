//! Channel egress — the single outbound interface used by tools, sub-agents,
//! and the vision worker to push text, media, typing indicators, and
//! questions back to the user.
//!
//! All platform routing happens inside the external bridge process; this
//! crate only shapes payloads and POSTs them.

pub mod bridge;
pub mod error;
pub mod questions;
pub mod types;
pub mod typing;

pub use bridge::BridgeClient;
pub use error::{ChannelError, Result};
pub use questions::PendingQuestions;
pub use types::{MediaKind, OutboundMessage};
pub use typing::TypingHandle;
