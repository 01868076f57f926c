//! `manage_cron_job` — create, list, and delete scheduled jobs.

use async_trait::async_trait;
use otto_scheduler::ScheduleKind;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

pub struct ManageCronJobTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> ManageCronJobTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for ManageCronJobTool<C> {
    fn name(&self) -> &str {
        "manage_cron_job"
    }

    fn description(&self) -> &str {
        "Create, list, or delete scheduled jobs. Schedules are five-field cron \
         expressions, interval seconds, or webhook tags (webhook jobs fire only \
         when their URL is called)."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["create", "list", "delete"] },
                "name": { "type": "string", "description": "Job name (for create)." },
                "schedule_type": {
                    "type": "string",
                    "enum": ["cron", "interval", "webhook"],
                    "description": "How schedule_value is interpreted."
                },
                "schedule_value": {
                    "type": "string",
                    "description": "Cron string (e.g. '0 9 * * *'), seconds (e.g. '60'), or webhook tag."
                },
                "task": { "type": "string", "description": "The prompt the agent runs when the job fires." },
                "job_id": { "type": "string", "description": "Job id (for delete)." }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let action = match require_str(&args, "action") {
            Ok(a) => a,
            Err(out) => return out,
        };

        match action {
            "create" => {
                let name = match require_str(&args, "name") {
                    Ok(v) => v,
                    Err(out) => return out,
                };
                let kind_str = match require_str(&args, "schedule_type") {
                    Ok(v) => v,
                    Err(out) => return out,
                };
                let value = match require_str(&args, "schedule_value") {
                    Ok(v) => v,
                    Err(out) => return out,
                };
                let task = match require_str(&args, "task") {
                    Ok(v) => v,
                    Err(out) => return out,
                };
                let kind: ScheduleKind = match kind_str.parse() {
                    Ok(k) => k,
                    Err(e) => return ToolOutcome::error(e.to_string()),
                };

                match self.t.ctx.cron().create_job(name, kind, value, task) {
                    Ok(job) => {
                        let mut msg =
                            format!("Job created with ID: {}. Type: {}", job.id, job.schedule_kind);
                        if kind == ScheduleKind::Webhook {
                            msg.push_str(&format!("\nWebhook URL: /cron/webhook/{}", job.id));
                        }
                        ToolOutcome::success(msg)
                    }
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "list" => match self.t.ctx.cron().list_jobs() {
                Ok(jobs) => ToolOutcome::success(
                    serde_json::to_string_pretty(&jobs).unwrap_or_else(|_| "[]".to_string()),
                ),
                Err(e) => ToolOutcome::error(e.to_string()),
            },
            "delete" => {
                let job_id = match require_str(&args, "job_id") {
                    Ok(v) => v,
                    Err(out) => return out,
                };
                match self.t.ctx.cron().delete_job(job_id) {
                    Ok(()) => ToolOutcome::success("Job deleted."),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            other => ToolOutcome::error(format!("unknown action: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::TestCtx;

    #[tokio::test]
    async fn create_webhook_job_echoes_its_url() {
        let ctx = TestCtx::new(vec![]);
        let tool = ManageCronJobTool::new(ToolCtx::new(ctx.clone(), "u1", "test"));

        let out = tool
            .execute(serde_json::json!({
                "action": "create",
                "name": "deploy-report",
                "schedule_type": "webhook",
                "schedule_value": "deploy",
                "task": "summarize the deploy"
            }))
            .await;
        assert!(out.content.contains("Webhook URL: /cron/webhook/"));
        assert_eq!(ctx.cron.list_jobs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_cron_expressions_surface_as_errors() {
        let ctx = TestCtx::new(vec![]);
        let tool = ManageCronJobTool::new(ToolCtx::new(ctx, "u1", "test"));
        let out = tool
            .execute(serde_json::json!({
                "action": "create",
                "name": "x",
                "schedule_type": "cron",
                "schedule_value": "whenever",
                "task": "y"
            }))
            .await;
        assert!(out.content.starts_with("Error"));
    }

    #[tokio::test]
    async fn delete_round_trip() {
        let ctx = TestCtx::new(vec![]);
        let job = ctx
            .cron
            .create_job("tick", otto_scheduler::ScheduleKind::Interval, "60", "t")
            .unwrap();
        let tool = ManageCronJobTool::new(ToolCtx::new(ctx.clone(), "u1", "test"));
        let out = tool
            .execute(serde_json::json!({"action": "delete", "job_id": job.id}))
            .await;
        assert_eq!(out.content, "Job deleted.");
        assert!(ctx.cron.list_jobs().unwrap().is_empty());
    }
}
