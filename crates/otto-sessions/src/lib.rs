//! History store — append-only per-session conversation log.
//!
//! Sessions are created lazily on first inbound event; messages are
//! immutable once written, with identical-to-previous appends dropped so a
//! turn replayed by two writers is stored once.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{HistoryError, Result};
pub use store::HistoryStore;
pub use types::{SessionRow, StoredMessage};
