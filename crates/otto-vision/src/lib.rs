//! Vision worker — the process-wide singleton that owns the screen.
//!
//! Consumes a FIFO goal queue and a high-priority correction queue, and runs
//! a perceive → plan → act cycle against a vision-capable LLM. Screen access
//! goes exclusively through the [`screen::ScreenDriver`] capability trait;
//! nothing else in the process may touch the mouse or keyboard.

pub mod actions;
pub mod error;
pub mod screen;
pub mod worker;

pub use error::{Result, VisionError};
pub use screen::{CommandDriver, ScreenDriver, Screenshot};
pub use worker::{VisionDeps, VisionHandle};
