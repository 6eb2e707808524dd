//! The fetch surface the synchronizer depends on.

use async_trait::async_trait;
use database::{Account, LogRow, Task};

use crate::client::Se2Client;
use crate::error::Se2Error;
use crate::types::{TaskFilter, TaskMetadata};

/// Upstream data source.
///
/// Fetches return `None` when the data could not be obtained completely;
/// `Some(vec![])` means the upstream genuinely has nothing.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_tasks(&self, filter: TaskFilter) -> Option<Vec<Task>>;

    async fn fetch_task_metadata(&self, sendtask_uuid: &str) -> Option<TaskMetadata>;

    async fn fetch_task_log(&self, sendtask_uuid: &str) -> Option<Vec<LogRow>>;

    async fn fetch_accounts(&self) -> Option<Vec<Account>>;

    /// Renew the upstream session.
    async fn refresh_credentials(&self) -> Result<(), Se2Error>;
}

#[async_trait]
impl RemoteSource for Se2Client {
    async fn fetch_tasks(&self, filter: TaskFilter) -> Option<Vec<Task>> {
        Se2Client::fetch_tasks(self, filter).await
    }

    async fn fetch_task_metadata(&self, sendtask_uuid: &str) -> Option<TaskMetadata> {
        Se2Client::fetch_task_metadata(self, sendtask_uuid).await
    }

    async fn fetch_task_log(&self, sendtask_uuid: &str) -> Option<Vec<LogRow>> {
        Se2Client::fetch_task_log(self, sendtask_uuid).await
    }

    async fn fetch_accounts(&self) -> Option<Vec<Account>> {
        Se2Client::fetch_accounts(self).await
    }

    async fn refresh_credentials(&self) -> Result<(), Se2Error> {
        self.refresh_token().await
    }
}
