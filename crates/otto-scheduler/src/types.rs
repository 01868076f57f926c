use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// How a job's `schedule_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Five-field POSIX cron expression.
    Cron,
    /// Fixed interval in whole seconds.
    Interval,
    /// Stored only — fires exclusively on explicit trigger.
    Webhook,
}

impl std::str::FromStr for ScheduleKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ScheduleKind::Cron),
            "interval" => Ok(ScheduleKind::Interval),
            "webhook" => Ok(ScheduleKind::Webhook),
            other => Err(SchedulerError::InvalidSchedule(format!(
                "unknown schedule type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleKind::Cron => "cron",
            ScheduleKind::Interval => "interval",
            ScheduleKind::Webhook => "webhook",
        };
        f.write_str(s)
    }
}

/// A persisted scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub schedule_kind: ScheduleKind,
    pub schedule_value: String,
    pub task: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_run: Option<String>,
}

/// A job the engine (or a manual trigger) decided to run now.
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub id: String,
    pub name: String,
    pub task: String,
}

impl From<&CronJob> for FiredJob {
    fn from(job: &CronJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            task: job.task.clone(),
        }
    }
}
