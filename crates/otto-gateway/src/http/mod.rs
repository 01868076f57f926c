pub mod chat;
pub mod cron;
pub mod incoming;
pub mod sessions;
pub mod status;
