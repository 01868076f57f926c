//! Scheduler — durable cron/interval/webhook jobs that fire fresh agent turns.
//!
//! Jobs persist in SQLite and survive restarts. The engine polls at one
//! second resolution and forwards fired jobs over an mpsc channel; the
//! gateway's delivery loop runs the actual agent turn so this crate never
//! depends on the engine. Webhook jobs are stored but only fire on explicit
//! trigger.

pub mod cron;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use store::CronStore;
pub use types::{CronJob, FiredJob, ScheduleKind};
