//! Task reconciliation between upstream and the local mirror.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use database::models::{from_record, to_record, TASK_COLUMNS};
use database::sendlog::log_table_name;
use database::{DatabaseError, Record, Select, Task};
use se2_client::{TaskFilter, TaskMetadata};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RemovalPolicy;
use crate::diff::diff;
use crate::error::{Result, SyncError};
use crate::logs::SyncStatus;
use crate::stats::{today_window, DayWindow};
use crate::Synchronizer;

/// Which tasks a reconciliation pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskScope {
    /// Tasks that ended, or were stopped, within the configured window.
    #[default]
    Recent,
    /// Tasks created during the current local day.
    CreatedToday,
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Tasks inserted or updated.
    pub changed: Vec<String>,
    /// Tasks removed according to the removal policy.
    pub removed: Vec<String>,
    /// Statistics refresh outcome for the changed tasks.
    pub stats: BTreeMap<String, SyncStatus>,
}

/// Whether `task` falls in the recency window starting at `since`.
pub fn is_recent(task: &Task, since: i64) -> bool {
    task.test_end_ut >= since || task.stop_time_new >= since
}

impl TaskScope {
    fn includes(&self, task: &Task, since: i64, today: DayWindow) -> bool {
        match self {
            TaskScope::Recent => is_recent(task, since),
            TaskScope::CreatedToday => today.contains(task.sendtask_create_ut),
        }
    }
}

/// Upstream tasks after the metadata merge.
#[derive(Debug, Default)]
struct RemoteSnapshot {
    /// Every UUID upstream returned, in scope or not.
    present: HashSet<String>,
    /// Tasks in scope.
    tasks: Vec<Task>,
    /// Tasks whose metadata fetch failed and carry the stored values.
    stale_metadata: HashSet<String>,
}

/// Fill the metadata columns of an upstream task. Without fresh metadata
/// the stored values are kept, so a failed lookup never moves a task out
/// of scope.
fn apply_metadata(mut task: Task, meta: Option<TaskMetadata>, stored: Option<&Task>) -> Task {
    let meta = match (meta, stored) {
        (Some(meta), _) => meta,
        (None, Some(stored)) => TaskMetadata {
            is_pause: stored.is_pause,
            stop_time_new: stored.stop_time_new,
        },
        (None, None) => TaskMetadata::default(),
    };
    task.is_pause = meta.is_pause;
    task.stop_time_new = meta.stop_time_new;
    task.canonicalize()
}

impl Synchronizer {
    /// Bring the local task mirror in line with upstream for `scope`.
    ///
    /// Fails with `Upstream` before touching anything when the task list
    /// cannot be fetched. Only tasks absent from the fetched list are
    /// removed.
    pub async fn reconcile_tasks(&self, scope: TaskScope) -> Result<ReconcileReport> {
        let now = Utc::now();
        let today = today_window(now, self.config.utc_offset);
        let since = self.window_start(now);

        let fetched = self.fetch_remote_tasks(scope, today).await?;
        let stored = self.stored_tasks().await?;
        let remote = self.merge_metadata(fetched, &stored, scope, since, today).await;
        let local: Vec<Task> = stored
            .into_iter()
            .filter(|t| scope.includes(t, since, today))
            .collect();

        let delta = diff(&remote.tasks, &local);
        info!(
            scope = ?scope,
            remote = remote.tasks.len(),
            local = local.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            stale_metadata = remote.stale_metadata.len(),
            "Task snapshots compared"
        );

        let mut report = ReconcileReport::default();

        for task in &delta.added {
            let mut record = to_record(task)?;
            record.insert("is_active".to_string(), Value::Bool(true));
            if remote.stale_metadata.contains(&task.sendtask_uuid) {
                record.remove("is_pause");
                record.remove("stop_time_new");
            }
            let status = self
                .db
                .upsert("sendtasks", record, &["sendtask_uuid"])
                .await?;
            if status.is_changed() {
                report.changed.push(task.sendtask_uuid.clone());
            }
            self.ensure_log_table(&task.sendtask_uuid).await?;
        }

        // A changed or out-of-scope task that upstream still lists is not a
        // removal.
        for task in delta
            .removed
            .iter()
            .filter(|t| !remote.present.contains(&t.sendtask_uuid))
        {
            self.remove_task(&task.sendtask_uuid).await?;
            report.removed.push(task.sendtask_uuid.clone());
        }

        if !report.changed.is_empty() {
            report.stats = self.refresh_stats(&report.changed).await?;
        }

        info!(
            changed = report.changed.len(),
            removed = report.removed.len(),
            "Task reconciliation finished"
        );
        Ok(report)
    }

    /// Apply the removal policy to one task.
    pub async fn remove_task(&self, sendtask_uuid: &str) -> Result<()> {
        let key = task_key(sendtask_uuid);

        match self.config.removal_policy {
            RemovalPolicy::Deactivate => {
                let mut values = Record::new();
                values.insert("is_active".to_string(), Value::Bool(false));
                ignore_missing(self.db.update("sendtasks", &values, &key).await)?;
                info!(sendtask_uuid = %sendtask_uuid, "Task deactivated");
            }
            RemovalPolicy::Purge => {
                ignore_missing(self.db.delete("sendtasks", &key).await)?;
                ignore_missing(self.db.delete("sendlog_stats", &key).await)?;
                self.db.drop_table(&log_table_name(sendtask_uuid)?).await?;
                info!(sendtask_uuid = %sendtask_uuid, "Task purged");
            }
        }
        Ok(())
    }

    /// UUIDs of every active local task.
    pub async fn active_task_uuids(&self) -> Result<Vec<String>> {
        let records = self
            .db
            .select("sendtasks", &Select::all().columns(["sendtask_uuid"]))
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|r| r.get("sendtask_uuid").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// The upstream task list for `scope`, before any metadata merge.
    async fn fetch_remote_tasks(&self, scope: TaskScope, today: DayWindow) -> Result<Vec<Task>> {
        let filter = match scope {
            TaskScope::Recent => TaskFilter::All,
            TaskScope::CreatedToday => TaskFilter::CreatedBetween {
                start: today.start,
                end: today.end,
            },
        };

        self.remote
            .fetch_tasks(filter)
            .await
            .ok_or_else(|| SyncError::upstream("task list"))
    }

    /// Merge metadata into every fetched task and keep the ones in scope.
    async fn merge_metadata(
        &self,
        fetched: Vec<Task>,
        stored: &[Task],
        scope: TaskScope,
        since: i64,
        today: DayWindow,
    ) -> RemoteSnapshot {
        let stored: HashMap<&str, &Task> = stored.iter().map(|t| (t.sendtask_uuid.as_str(), t)).collect();
        let mut snapshot = RemoteSnapshot::default();

        for task in fetched {
            let meta = self.remote.fetch_task_metadata(&task.sendtask_uuid).await;
            if meta.is_none() {
                warn!(sendtask_uuid = %task.sendtask_uuid, "Task metadata unavailable, keeping stored values");
                snapshot.stale_metadata.insert(task.sendtask_uuid.clone());
            }
            let previous = stored.get(task.sendtask_uuid.as_str()).copied();
            let task = apply_metadata(task, meta, previous);

            snapshot.present.insert(task.sendtask_uuid.clone());
            if scope.includes(&task, since, today) {
                snapshot.tasks.push(task);
            }
        }

        debug!(scope = ?scope, tasks = snapshot.tasks.len(), "Upstream tasks in scope");
        snapshot
    }

    /// Every active local task, projected to the mirrored columns.
    async fn stored_tasks(&self) -> Result<Vec<Task>> {
        let records = self
            .db
            .select("sendtasks", &Select::all().columns(TASK_COLUMNS.iter().copied()))
            .await?;

        let tasks = records
            .into_iter()
            .map(|record| from_record::<Task>(record).map(Task::canonicalize))
            .collect::<std::result::Result<Vec<_>, DatabaseError>>()?;
        Ok(tasks)
    }

    fn window_start(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.config.task_window_days * 86_400
    }
}

fn task_key(sendtask_uuid: &str) -> Record {
    let mut key = Record::new();
    key.insert(
        "sendtask_uuid".to_string(),
        Value::String(sendtask_uuid.to_string()),
    );
    key
}

fn ignore_missing<T>(result: std::result::Result<T, DatabaseError>) -> Result<()> {
    match result {
        Ok(_) | Err(DatabaseError::NoMatchingRecord { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
