use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::db::init_db;
use crate::error::{HistoryError, Result};
use crate::types::{SessionRow, StoredMessage};

/// Thread-safe store for persisted sessions and their message logs.
///
/// Wraps a single SQLite connection in a `Mutex`. All writes for one session
/// serialize on that lock, which is what keeps the ordering invariants of the
/// conversation log intact without any finer-grained coordination.
pub struct HistoryStore {
    db: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the store at `path` and initialise the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Create a session. Returns `false` when it already exists (idempotent).
    pub fn create(&self, session_id: &str, parent_session_id: Option<&str>) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let inserted = db.execute(
            "INSERT OR IGNORE INTO sessions (session_id, parent_session_id, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![session_id, parent_session_id, now],
        )?;
        Ok(inserted > 0)
    }

    /// List all sessions, newest first.
    pub fn list(&self) -> Result<Vec<SessionRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT session_id, parent_session_id, created_at
             FROM sessions ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionRow {
                session_id: row.get(0)?,
                parent_session_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Append a message to a session's log.
    ///
    /// The append is silently dropped when the most recent entry matches on
    /// all of (role, content, tool_call_id, name) — the double-writer dedup
    /// rule.
    pub fn append(&self, session_id: &str, message: &StoredMessage) -> Result<()> {
        let db = self.db.lock().unwrap();

        let last: Option<(String, Option<String>, Option<String>, Option<String>)> = db
            .query_row(
                "SELECT role, content, tool_call_id, name FROM messages
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT 1",
                rusqlite::params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        if let Some((role, content, tool_call_id, name)) = last {
            if role == message.role
                && content == message.content
                && tool_call_id == message.tool_call_id
                && name == message.name
            {
                debug!(session = %session_id, role = %message.role, "dropping duplicate append");
                return Ok(());
            }
        }

        let tool_calls_json = match &message.tool_calls {
            Some(calls) => Some(serde_json::to_string(calls)?),
            None => None,
        };
        let now = chrono::Utc::now().to_rfc3339();

        db.execute(
            "INSERT INTO messages (session_id, role, content, tool_calls, tool_call_id, name, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                session_id,
                message.role,
                message.content,
                tool_calls_json,
                message.tool_call_id,
                message.name,
                now,
            ],
        )?;
        Ok(())
    }

    /// Load messages in insertion order, tool calls rehydrated from JSON.
    ///
    /// With `limit` set, only the most recent N entries are returned (still
    /// oldest-first).
    pub fn load(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT role, content, tool_calls, tool_call_id, name FROM messages
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], |row| {
            let tool_calls_json: Option<String> = row.get(2)?;
            Ok(StoredMessage {
                role: row.get(0)?,
                content: row.get(1)?,
                tool_calls: tool_calls_json
                    .and_then(|j| serde_json::from_str::<Vec<serde_json::Value>>(&j).ok()),
                tool_call_id: row.get(3)?,
                name: row.get(4)?,
            })
        })?;

        let mut messages: Vec<StoredMessage> = rows.filter_map(|r| r.ok()).collect();
        if let Some(n) = limit {
            if messages.len() > n {
                messages.drain(..messages.len() - n);
            }
        }
        Ok(messages)
    }

    /// Delete all messages for a session. The session row itself survives.
    pub fn reset(&self, session_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM messages WHERE session_id = ?1",
            rusqlite::params![session_id],
        )?;
        Ok(())
    }

    /// Look up a session row by id.
    pub fn get(&self, session_id: &str) -> Result<SessionRow> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT session_id, parent_session_id, created_at FROM sessions
             WHERE session_id = ?1",
            rusqlite::params![session_id],
            |row| {
                Ok(SessionRow {
                    session_id: row.get(0)?,
                    parent_session_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| HistoryError::NotFound {
            session_id: session_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::open_in_memory().unwrap()
    }

    #[test]
    fn create_is_idempotent() {
        let s = store();
        assert!(s.create("u1", None).unwrap());
        assert!(!s.create("u1", None).unwrap());
        assert_eq!(s.list().unwrap().len(), 1);
    }

    #[test]
    fn child_session_records_parent() {
        let s = store();
        s.create("u1", None).unwrap();
        s.create("u1-research", Some("u1")).unwrap();
        let row = s.get("u1-research").unwrap();
        assert_eq!(row.parent_session_id.as_deref(), Some("u1"));
    }

    #[test]
    fn load_returns_insertion_order() {
        let s = store();
        s.create("u1", None).unwrap();
        s.append("u1", &StoredMessage::user("hello")).unwrap();
        s.append("u1", &StoredMessage::assistant("hi there")).unwrap();
        s.append("u1", &StoredMessage::user("how are you")).unwrap();

        let msgs = s.load("u1", None).unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content.as_deref(), Some("hello"));
        assert_eq!(msgs[2].content.as_deref(), Some("how are you"));
    }

    #[test]
    fn adjacent_duplicates_are_dropped() {
        let s = store();
        s.create("u1", None).unwrap();
        s.append("u1", &StoredMessage::user("hello")).unwrap();
        s.append("u1", &StoredMessage::user("hello")).unwrap();
        assert_eq!(s.load("u1", None).unwrap().len(), 1);

        // Same content reappearing later (not adjacent) is stored.
        s.append("u1", &StoredMessage::assistant("hi")).unwrap();
        s.append("u1", &StoredMessage::user("hello")).unwrap();
        assert_eq!(s.load("u1", None).unwrap().len(), 3);
    }

    #[test]
    fn tool_results_with_distinct_call_ids_are_not_duplicates() {
        let s = store();
        s.create("u1", None).unwrap();
        s.append("u1", &StoredMessage::tool_result("call_1", "fetch_url", "ok"))
            .unwrap();
        s.append("u1", &StoredMessage::tool_result("call_2", "fetch_url", "ok"))
            .unwrap();
        assert_eq!(s.load("u1", None).unwrap().len(), 2);
    }

    #[test]
    fn tool_calls_round_trip_through_json() {
        let s = store();
        s.create("u1", None).unwrap();
        let call = serde_json::json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_system_info", "arguments": "{}"}
        });
        s.append("u1", &StoredMessage::assistant_tool_calls(vec![call.clone()]))
            .unwrap();

        let msgs = s.load("u1", None).unwrap();
        assert_eq!(msgs[0].content, None);
        assert_eq!(msgs[0].tool_calls.as_ref().unwrap()[0], call);
    }

    #[test]
    fn reset_empties_the_log() {
        let s = store();
        s.create("u1", None).unwrap();
        s.append("u1", &StoredMessage::user("hello")).unwrap();
        s.reset("u1").unwrap();
        assert!(s.load("u1", None).unwrap().is_empty());
        // Session row survives the reset.
        assert!(s.get("u1").is_ok());
    }

    #[test]
    fn load_with_limit_keeps_most_recent() {
        let s = store();
        s.create("u1", None).unwrap();
        for i in 0..10 {
            s.append("u1", &StoredMessage::user(format!("msg {i}"))).unwrap();
        }
        let msgs = s.load("u1", Some(3)).unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content.as_deref(), Some("msg 7"));
        assert_eq!(msgs[2].content.as_deref(), Some("msg 9"));
    }
}
