use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::cron::CronExpr;
use crate::store::CronStore;
use crate::types::{CronJob, FiredJob, ScheduleKind};

/// Tick engine: polls the job table at 1 s resolution and forwards due jobs.
///
/// Next-run instants live only in memory and are recomputed on startup and
/// whenever a new job row appears, so tool/HTTP-created jobs are picked up
/// within one tick without any notification channel. Webhook jobs are never
/// given a next-run — they fire only via [`SchedulerEngine::trigger`] or the
/// gateway's webhook route.
pub struct SchedulerEngine {
    store: Arc<CronStore>,
    fired_tx: mpsc::Sender<FiredJob>,
    next_runs: HashMap<String, DateTime<Utc>>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<CronStore>, fired_tx: mpsc::Sender<FiredJob>) -> Self {
        Self {
            store,
            fired_tx,
            next_runs: HashMap::new(),
        }
    }

    /// Main loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Manually fire a job regardless of its schedule kind.
    pub async fn trigger(store: &CronStore, fired_tx: &mpsc::Sender<FiredJob>, id: &str) -> crate::error::Result<()> {
        let job = store.get_job(id)?;
        info!(job_id = %id, name = %job.name, "job triggered manually");
        store.mark_run(id)?;
        if fired_tx.send(FiredJob::from(&job)).await.is_err() {
            warn!(job_id = %id, "delivery channel closed — trigger dropped");
        }
        Ok(())
    }

    /// One scheduling pass at instant `now`. Public for tests.
    pub fn tick(&mut self, now: DateTime<Utc>) -> crate::error::Result<()> {
        let jobs = self.store.list_jobs()?;

        // Forget next-runs for rows that no longer exist.
        self.next_runs
            .retain(|id, _| jobs.iter().any(|j| &j.id == id));

        for job in jobs.iter().filter(|j| j.is_active) {
            if job.schedule_kind == ScheduleKind::Webhook {
                continue;
            }

            let next = match self.next_runs.get(&job.id) {
                Some(next) => *next,
                None => match compute_next(job, now) {
                    Some(next) => {
                        self.next_runs.insert(job.id.clone(), next);
                        next
                    }
                    None => {
                        warn!(job_id = %job.id, value = %job.schedule_value, "job has no computable next run");
                        continue;
                    }
                },
            };

            if next <= now {
                info!(job_id = %job.id, name = %job.name, "firing scheduled job");
                self.store.mark_run(&job.id)?;
                // try_send keeps the tick loop from ever stalling on a slow consumer.
                if self.fired_tx.try_send(FiredJob::from(job)).is_err() {
                    warn!(job_id = %job.id, "delivery channel full or closed — fire dropped");
                }
                match compute_next(job, now) {
                    Some(next) => {
                        self.next_runs.insert(job.id.clone(), next);
                    }
                    None => {
                        self.next_runs.remove(&job.id);
                    }
                }
            }
        }
        Ok(())
    }
}

fn compute_next(job: &CronJob, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match job.schedule_kind {
        ScheduleKind::Cron => CronExpr::parse(&job.schedule_value).ok()?.next_after(from),
        ScheduleKind::Interval => {
            let secs: i64 = job.schedule_value.trim().parse().ok()?;
            Some(from + Duration::seconds(secs))
        }
        ScheduleKind::Webhook => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(
        jobs: &[(&str, ScheduleKind, &str)],
    ) -> (SchedulerEngine, mpsc::Receiver<FiredJob>, Arc<CronStore>) {
        let store = Arc::new(CronStore::open_in_memory().unwrap());
        for (name, kind, value) in jobs {
            store.create_job(name, *kind, value, "do the thing").unwrap();
        }
        let (tx, rx) = mpsc::channel(16);
        (SchedulerEngine::new(Arc::clone(&store), tx), rx, store)
    }

    #[test]
    fn interval_job_fires_after_its_period() {
        let (mut engine, mut rx, _store) = engine_with(&[("every-min", ScheduleKind::Interval, "60")]);
        let t0 = Utc::now();

        // First tick registers the next run; nothing fires yet.
        engine.tick(t0).unwrap();
        assert!(rx.try_recv().is_err());

        // 61 seconds later the job is due.
        engine.tick(t0 + Duration::seconds(61)).unwrap();
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.name, "every-min");

        // And not again immediately.
        engine.tick(t0 + Duration::seconds(62)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn webhook_jobs_never_fire_from_the_timer() {
        let (mut engine, mut rx, _store) = engine_with(&[("hook", ScheduleKind::Webhook, "tag")]);
        let t0 = Utc::now();
        for offset in 0..600 {
            engine.tick(t0 + Duration::seconds(offset)).unwrap();
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn manual_trigger_fires_webhook_jobs() {
        let store = Arc::new(CronStore::open_in_memory().unwrap());
        let job = store
            .create_job("hook", ScheduleKind::Webhook, "tag", "do the thing")
            .unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        SchedulerEngine::trigger(&store, &tx, &job.id).await.unwrap();
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.name, "hook");
        assert!(store.get_job(&job.id).unwrap().last_run.is_some());
    }

    #[test]
    fn deleted_jobs_stop_firing() {
        let (mut engine, mut rx, store) = engine_with(&[("gone", ScheduleKind::Interval, "1")]);
        let t0 = Utc::now();
        engine.tick(t0).unwrap();
        let id = store.list_jobs().unwrap()[0].id.clone();
        store.delete_job(&id).unwrap();
        engine.tick(t0 + Duration::seconds(5)).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
