//! Shared configuration, constants, and the top-level error type.

pub mod config;
pub mod error;

/// Marker prepended to every outbound message. Any inbound message that
/// contains it is one of our own echoes and is dropped by the router.
pub const SELF_TAG: &str = "[Otto]";

/// Literal control command that wipes the addressed session's history.
pub const RESET_COMMAND: &str = "/reset";
