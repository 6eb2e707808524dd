//! Periodic jobs.
//!
//! Each job gets its own loop task. A run is spawned separately so a failed
//! or panicking run is logged and the loop keeps going.

use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use crate::error::{Result, SyncError};
use crate::reconcile::TaskScope;
use crate::Synchronizer;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fixed period, first run one period after start.
    Every(Duration),
    /// Once a day at this local time.
    DailyAt(NaiveTime),
}

impl Trigger {
    /// Time to wait from `now` until the next firing.
    ///
    /// A daily trigger whose time is exactly `now` fires a day later.
    pub fn next_delay(&self, now: DateTime<Utc>, offset: FixedOffset) -> Duration {
        match self {
            Trigger::Every(period) => *period,
            Trigger::DailyAt(at) => {
                let local = now.with_timezone(&offset);
                let mut date = local.date_naive();
                if local.time() >= *at {
                    date = date.succ_opt().unwrap_or(date);
                }
                let next = offset
                    .from_local_datetime(&date.and_time(*at))
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(now);
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// The scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    RefreshToken,
    RefreshStats,
    ReconcileTasks,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::RefreshToken => "refresh_token",
            Job::RefreshStats => "refresh_stats",
            Job::ReconcileTasks => "reconcile_tasks",
        }
    }

    fn trigger(&self, sync: &Synchronizer) -> Trigger {
        let config = sync.config();
        match self {
            Job::RefreshToken => Trigger::Every(config.token_refresh_every),
            Job::RefreshStats => Trigger::DailyAt(config.stats_at),
            Job::ReconcileTasks => Trigger::DailyAt(config.reconcile_at),
        }
    }
}

impl Synchronizer {
    /// Execute one run of `job`.
    pub async fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::RefreshToken => self
                .remote
                .refresh_credentials()
                .await
                .map_err(|e| SyncError::upstream(format!("token refresh: {}", e))),
            Job::RefreshStats => self.refresh_all_stats().await.map(|_| ()),
            Job::ReconcileTasks => self.reconcile_tasks(TaskScope::Recent).await.map(|_| ()),
        }
    }
}

/// Handles to the running job loops.
#[derive(Debug)]
pub struct SchedulerHandle {
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop every job loop. A run in flight is not cancelled.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
        info!("Scheduler stopped");
    }
}

/// Start a loop task for each job.
pub fn start_scheduler(sync: Synchronizer) -> SchedulerHandle {
    let jobs = [Job::RefreshToken, Job::RefreshStats, Job::ReconcileTasks];
    let handles = jobs
        .into_iter()
        .map(|job| {
            let trigger = job.trigger(&sync);
            info!(job = job.name(), trigger = ?trigger, "Scheduling job");
            tokio::spawn(job_loop(sync.clone(), job, trigger))
        })
        .collect();
    SchedulerHandle { handles }
}

async fn job_loop(sync: Synchronizer, job: Job, trigger: Trigger) {
    loop {
        let delay = trigger.next_delay(Utc::now(), sync.config().utc_offset);
        tokio::time::sleep(delay).await;

        let span = info_span!("job", name = job.name());
        let run_sync = sync.clone();
        let started = Instant::now();
        info!(parent: &span, "Job started");

        let outcome = tokio::spawn(async move { run_sync.run_job(job).await }.instrument(span.clone())).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => info!(parent: &span, elapsed_ms, "Job finished"),
            Ok(Err(e)) => error!(parent: &span, elapsed_ms, error = %e, "Job failed"),
            Err(e) if e.is_panic() => error!(parent: &span, elapsed_ms, "Job panicked"),
            Err(e) => error!(parent: &span, elapsed_ms, error = %e, "Job aborted"),
        }
    }
}
