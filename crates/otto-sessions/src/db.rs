use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions and messages tables.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id        TEXT PRIMARY KEY,
            parent_session_id TEXT,
            created_at        TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id   TEXT NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT,
            tool_calls   TEXT,
            tool_call_id TEXT,
            name         TEXT,
            timestamp    TEXT NOT NULL,
            FOREIGN KEY(session_id) REFERENCES sessions(session_id)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, id);",
    )?;
    Ok(())
}
