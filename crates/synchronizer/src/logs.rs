//! Recipient log refresh.

use std::collections::BTreeMap;
use std::fmt;

use database::UpsertStatus;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::Synchronizer;

/// Per-task outcome of a log or statistics refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Changed,
    Unchanged,
    /// Upstream data was unavailable; nothing was written.
    Skipped,
}

impl From<UpsertStatus> for SyncStatus {
    fn from(status: UpsertStatus) -> Self {
        match status {
            UpsertStatus::Changed => SyncStatus::Changed,
            UpsertStatus::Unchanged => SyncStatus::Unchanged,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Changed => write!(f, "changed"),
            SyncStatus::Unchanged => write!(f, "unchanged"),
            SyncStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl Synchronizer {
    /// Make sure the task's log table exists; returns its name.
    pub async fn ensure_log_table(&self, sendtask_uuid: &str) -> Result<String> {
        Ok(self.db.ensure_log_table(sendtask_uuid).await?)
    }

    /// Mirror upstream recipient rows for each task, keyed by recipient
    /// `uuid`. Captured event arrays are never touched.
    pub async fn sync_task_logs(&self, uuids: &[String]) -> Result<BTreeMap<String, SyncStatus>> {
        let mut statuses = BTreeMap::new();

        for uuid in uuids {
            let table = self.ensure_log_table(uuid).await?;

            let Some(rows) = self.remote.fetch_task_log(uuid).await else {
                warn!(sendtask_uuid = %uuid, "Task log unavailable upstream");
                statuses.insert(uuid.clone(), SyncStatus::Skipped);
                continue;
            };

            let mut status = SyncStatus::Unchanged;
            for row in &rows {
                let outcome = self
                    .db
                    .upsert(&table, row.upstream_record()?, &["uuid"])
                    .await?;
                if outcome.is_changed() {
                    status = SyncStatus::Changed;
                }
            }

            debug!(sendtask_uuid = %uuid, rows = rows.len(), status = %status, "Task log synced");
            statuses.insert(uuid.clone(), status);
        }

        Ok(statuses)
    }
}
