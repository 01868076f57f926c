use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::cron::CronExpr;
use crate::error::{Result, SchedulerError};
use crate::types::{CronJob, ScheduleKind};

/// Thread-safe persistence for scheduled jobs.
///
/// Shared between the tick engine and the HTTP/tool management surface.
pub struct CronStore {
    db: Mutex<Connection>,
}

impl CronStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Create a job after validating its schedule value.
    pub fn create_job(
        &self,
        name: &str,
        kind: ScheduleKind,
        value: &str,
        task: &str,
    ) -> Result<CronJob> {
        match kind {
            ScheduleKind::Cron => {
                CronExpr::parse(value)?;
            }
            ScheduleKind::Interval => {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    SchedulerError::InvalidSchedule(format!("interval is not a number: '{value}'"))
                })?;
                if secs == 0 {
                    return Err(SchedulerError::InvalidSchedule(
                        "interval must be at least 1 second".into(),
                    ));
                }
            }
            // Webhook values are opaque tags.
            ScheduleKind::Webhook => {}
        }

        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO cron_jobs (id, name, schedule_type, schedule_value, task, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            rusqlite::params![id, name, kind.to_string(), value, task, now],
        )?;
        info!(job_id = %id, %name, kind = %kind, "cron job created");

        Ok(CronJob {
            id,
            name: name.to_string(),
            schedule_kind: kind,
            schedule_value: value.to_string(),
            task: task.to_string(),
            is_active: true,
            created_at: now,
            last_run: None,
        })
    }

    pub fn get_job(&self, id: &str) -> Result<CronJob> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, name, schedule_type, schedule_value, task, is_active, created_at, last_run
             FROM cron_jobs WHERE id = ?1",
            [id],
            row_to_job,
        )
        .optional()?
        .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })
    }

    /// All jobs, oldest first.
    pub fn list_jobs(&self) -> Result<Vec<CronJob>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, schedule_type, schedule_value, task, is_active, created_at, last_run
             FROM cron_jobs ORDER BY created_at",
        )?;
        let jobs = stmt.query_map([], row_to_job)?.filter_map(|r| r.ok()).collect();
        Ok(jobs)
    }

    pub fn delete_job(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM cron_jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "cron job deleted");
        Ok(())
    }

    /// Stamp `last_run` with the current time.
    pub fn mark_run(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE cron_jobs SET last_run = ?1 WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        Ok(())
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cron_jobs (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            schedule_type  TEXT NOT NULL,
            schedule_value TEXT NOT NULL,
            task           TEXT NOT NULL,
            is_active      INTEGER NOT NULL DEFAULT 1,
            created_at     TEXT NOT NULL,
            last_run       TEXT
        );",
    )?;
    Ok(())
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<CronJob> {
    let kind_str: String = row.get(2)?;
    Ok(CronJob {
        id: row.get(0)?,
        name: row.get(1)?,
        schedule_kind: kind_str.parse().unwrap_or(ScheduleKind::Webhook),
        schedule_value: row.get(3)?,
        task: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        last_run: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_list_delete_round_trip() {
        let s = CronStore::open_in_memory().unwrap();
        let job = s
            .create_job("daily-report", ScheduleKind::Cron, "0 9 * * *", "write the report")
            .unwrap();
        assert_eq!(job.id.len(), 8);
        assert_eq!(s.list_jobs().unwrap().len(), 1);

        s.delete_job(&job.id).unwrap();
        assert!(s.list_jobs().unwrap().is_empty());
        assert!(matches!(
            s.delete_job(&job.id),
            Err(SchedulerError::JobNotFound { .. })
        ));
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        let s = CronStore::open_in_memory().unwrap();
        assert!(s
            .create_job("bad", ScheduleKind::Cron, "not a cron", "x")
            .is_err());
        assert!(s
            .create_job("bad", ScheduleKind::Interval, "soon", "x")
            .is_err());
        assert!(s.create_job("bad", ScheduleKind::Interval, "0", "x").is_err());
        // Webhook values are opaque and always accepted.
        assert!(s
            .create_job("hook", ScheduleKind::Webhook, "deploy-done", "x")
            .is_ok());
    }

    #[test]
    fn mark_run_stamps_last_run() {
        let s = CronStore::open_in_memory().unwrap();
        let job = s
            .create_job("tick", ScheduleKind::Interval, "60", "x")
            .unwrap();
        assert!(s.get_job(&job.id).unwrap().last_run.is_none());
        s.mark_run(&job.id).unwrap();
        assert!(s.get_job(&job.id).unwrap().last_run.is_some());
    }
}
