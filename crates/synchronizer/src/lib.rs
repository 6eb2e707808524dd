//! Keeps the local mirror in line with SE2.
//!
//! A [`Synchronizer`] bundles the database handle, the upstream source and
//! the run configuration. Everything else hangs off it:
//!
//! - [`Synchronizer::reconcile_tasks`] diffs upstream and local tasks
//! - [`Synchronizer::sync_task_logs`] mirrors recipient rows
//! - [`Synchronizer::refresh_stats`] recomputes per-task counters
//! - [`Synchronizer::sync_accounts`] mirrors accounts
//! - [`start_scheduler`] runs the periodic jobs
//!
//! ```no_run
//! use std::sync::Arc;
//! use database::Database;
//! use se2_client::{FileCredentialStore, Se2Client, Se2Config};
//! use synchronizer::{start_scheduler, SyncConfig, Synchronizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://localhost/se2").await?;
//! let se2 = Se2Config::from_env()?;
//! let cookies = Arc::new(FileCredentialStore::new(se2.cookie_path.clone()));
//! let client = Se2Client::new(se2, cookies)?;
//! let sync = Synchronizer::new(db, Arc::new(client), SyncConfig::from_env()?);
//! sync.initialize().await?;
//! let scheduler = start_scheduler(sync.clone());
//! # scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use database::Database;
use se2_client::RemoteSource;

pub mod accounts;
pub mod config;
pub mod diff;
pub mod error;
pub mod logs;
pub mod reconcile;
pub mod scheduler;
pub mod stats;

pub use accounts::AccountSyncReport;
pub use config::{RemovalPolicy, SyncConfig};
pub use diff::{diff, Diff};
pub use error::{Result, SyncError};
pub use logs::SyncStatus;
pub use reconcile::{ReconcileReport, TaskScope};
pub use scheduler::{start_scheduler, Job, SchedulerHandle, Trigger};
pub use stats::{calc_stats, today_window, DayWindow};

/// Shared context for synchronization runs. Cheap to clone.
#[derive(Clone)]
pub struct Synchronizer {
    pub(crate) db: Database,
    pub(crate) remote: Arc<dyn RemoteSource>,
    pub(crate) config: SyncConfig,
}

impl Synchronizer {
    pub fn new(db: Database, remote: Arc<dyn RemoteSource>, config: SyncConfig) -> Self {
        Self { db, remote, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
