//! Account mirroring and first-run initialization.

use std::collections::HashSet;

use database::models::to_record;
use database::{Record, Select};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::reconcile::TaskScope;
use crate::Synchronizer;

/// What an account sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSyncReport {
    pub changed: usize,
    pub unchanged: usize,
    pub deactivated: usize,
}

impl Synchronizer {
    /// Upsert upstream accounts by `acct_uuid` and deactivate local accounts
    /// no longer listed upstream.
    pub async fn sync_accounts(&self) -> Result<AccountSyncReport> {
        let accounts = self
            .remote
            .fetch_accounts()
            .await
            .ok_or_else(|| SyncError::upstream("account list"))?;

        let mut report = AccountSyncReport::default();
        let upstream: HashSet<String> = accounts.iter().map(|a| a.acct_uuid.clone()).collect();

        for account in accounts {
            let record = to_record(&account.canonicalize())?;
            if self.db.upsert("accts", record, &["acct_uuid"]).await?.is_changed() {
                report.changed += 1;
            } else {
                report.unchanged += 1;
            }
        }

        let local = self
            .db
            .select("accts", &Select::all().columns(["acct_uuid"]))
            .await?;
        for uuid in local
            .iter()
            .filter_map(|r| r.get("acct_uuid").and_then(Value::as_str))
            .filter(|uuid| !upstream.contains(*uuid))
        {
            let mut values = Record::new();
            values.insert("is_active".to_string(), Value::Bool(false));
            let mut key = Record::new();
            key.insert("acct_uuid".to_string(), Value::String(uuid.to_string()));
            self.db.update("accts", &values, &key).await?;
            report.deactivated += 1;
        }

        info!(
            changed = report.changed,
            unchanged = report.unchanged,
            deactivated = report.deactivated,
            "Accounts synced"
        );
        Ok(report)
    }

    /// Populate `accts`, `sendtasks` and `sendlog_stats` from upstream when
    /// they are empty. Tables that already hold rows are left alone.
    pub async fn initialize(&self) -> Result<()> {
        if self.db.is_table_empty("accts").await? {
            info!("accts is empty, initializing from upstream");
            self.sync_accounts().await?;
        }

        if self.db.is_table_empty("sendtasks").await? {
            info!("sendtasks is empty, initializing from upstream");
            self.reconcile_tasks(TaskScope::Recent).await?;
        }

        if self.db.is_table_empty("sendlog_stats").await? {
            info!("sendlog_stats is empty, computing statistics");
            self.refresh_all_stats().await?;
        }

        Ok(())
    }
}
