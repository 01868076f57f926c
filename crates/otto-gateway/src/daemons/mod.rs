//! The three self-triggered reflection loops.
//!
//! Each daemon runs on its own cadence, owns a dedicated session id, and
//! logs-and-sleeps on engine errors — none of them may take the process
//! down.

pub mod conscious;
pub mod heartbeat;
pub mod subconscious;
