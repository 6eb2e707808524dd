//! Per-task send statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use database::models::{from_record, to_record};
use database::sendlog::log_table_name;
use database::{LogRow, Select, StatsRow};
use tracing::{info, warn};

use crate::error::Result;
use crate::logs::SyncStatus;
use crate::Synchronizer;

/// A local calendar day as `[start, end)` epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: i64,
    pub end: i64,
}

impl DayWindow {
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// The local day containing `now` under `offset`.
pub fn today_window(now: DateTime<Utc>, offset: FixedOffset) -> DayWindow {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    // Fixed offsets have no gaps, so the mapping is always unique
    let start = offset
        .from_local_datetime(&local_midnight)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| now.timestamp());
    DayWindow {
        start,
        end: start + Duration::days(1).num_seconds(),
    }
}

/// Derive the statistics row for one task from its log rows.
pub fn calc_stats(sendtask_uuid: &str, rows: &[LogRow], today: DayWindow) -> StatsRow {
    let today_plans: Vec<i64> = rows
        .iter()
        .map(|r| r.plan_time)
        .filter(|t| today.contains(*t))
        .collect();
    let today_sends: Vec<&LogRow> = rows
        .iter()
        .filter(|r| r.is_sent() && today.contains(r.send_time))
        .collect();

    StatsRow {
        sendtask_uuid: sendtask_uuid.to_string(),
        total_planned: rows.len() as i64,
        total_sent: rows.iter().filter(|r| r.is_sent()).count() as i64,
        total_success: rows.iter().filter(|r| r.succeeded()).count() as i64,
        today_planned: today_plans.len() as i64,
        today_sent: today_sends.len() as i64,
        today_success: today_sends.iter().filter(|r| r.succeeded()).count() as i64,
        today_unsent: rows
            .iter()
            .filter(|r| today.contains(r.plan_time) && !r.is_sent())
            .count() as i64,
        today_earliest_plan_time: today_plans.iter().copied().min().unwrap_or(0),
        today_latest_plan_time: today_plans.iter().copied().max().unwrap_or(0),
        all_earliest_plan_time: rows.iter().map(|r| r.plan_time).min().unwrap_or(0),
        all_latest_plan_time: rows.iter().map(|r| r.plan_time).max().unwrap_or(0),
    }
}

impl Synchronizer {
    /// Refresh logs for `uuids`, then recompute and upsert their statistics.
    ///
    /// A task whose log could not be fetched is `Skipped` and its stats row
    /// is left as it was.
    pub async fn refresh_stats(&self, uuids: &[String]) -> Result<BTreeMap<String, SyncStatus>> {
        let log_statuses = self.sync_task_logs(uuids).await?;
        let today = today_window(Utc::now(), self.config.utc_offset);

        let mut statuses = BTreeMap::new();
        for uuid in uuids {
            if log_statuses.get(uuid) == Some(&SyncStatus::Skipped) {
                warn!(sendtask_uuid = %uuid, "Log unavailable, statistics left untouched");
                statuses.insert(uuid.clone(), SyncStatus::Skipped);
                continue;
            }

            let table = log_table_name(uuid)?;
            let rows = self
                .db
                .select(&table, &Select::all())
                .await?
                .into_iter()
                .map(|mut record| {
                    record.remove("id");
                    from_record::<LogRow>(record)
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let stats = calc_stats(uuid, &rows, today);
            let status = self
                .db
                .upsert("sendlog_stats", to_record(&stats)?, &["sendtask_uuid"])
                .await?;
            info!(sendtask_uuid = %uuid, status = %status, "Statistics refreshed");
            statuses.insert(uuid.clone(), status.into());
        }

        Ok(statuses)
    }

    /// Refresh statistics for every active task.
    pub async fn refresh_all_stats(&self) -> Result<BTreeMap<String, SyncStatus>> {
        let uuids = self.active_task_uuids().await?;
        info!(tasks = uuids.len(), "Refreshing statistics for all tasks");
        self.refresh_stats(&uuids).await
    }
}
