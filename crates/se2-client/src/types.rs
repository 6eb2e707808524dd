//! Request and response shapes of the SE2 API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TASKS_ENDPOINT: &str = "/api/case/get_sendtasks";
pub const TASK_LOG_ENDPOINT: &str = "/api/case/get_sendlog";
pub const TASK_INFO_ENDPOINT: &str = "/api/case/get_sendtask_info";
pub const ACCOUNTS_ENDPOINT: &str = "/api/account/get_accts";
pub const ACCOUNT_ENDPOINT: &str = "/api/account/get_acct";
pub const REFRESH_ENDPOINT: &str = "/api/account/refresh_token";

/// Which tasks to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    /// Every task, newest first.
    All,
    /// Tasks created in `[start, end)`, epoch seconds.
    CreatedBetween { start: i64, end: i64 },
}

/// Result of a paged fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paged {
    pub records: Vec<Value>,
    /// False when a page request failed and `records` is a prefix.
    pub complete: bool,
}

/// Per-task state that only the task info endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, alias = "pause")]
    pub is_pause: bool,
    #[serde(default = "no_stop_time")]
    pub stop_time_new: i64,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            is_pause: false,
            stop_time_new: no_stop_time(),
        }
    }
}

fn no_stop_time() -> i64 {
    -1
}

/// Standard response envelope; payloads live under `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub data: Value,
}

/// One organization of an account.
#[derive(Debug, Deserialize)]
pub(crate) struct Org {
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountDetail {
    #[serde(default)]
    pub orgs: Vec<Org>,
}

pub(crate) fn tasks_payload(filter: TaskFilter) -> Value {
    let (start, end, range) = match filter {
        TaskFilter::All => (Value::Null, Value::Null, 0),
        TaskFilter::CreatedBetween { start, end } => (json!(start), json!(end), 99),
    };
    json!({
        "end_time": end,
        "filter_time_range": range,
        "order_field": "CreateTime",
        "order_method": "desc",
        "page_sn": 1,
        "record_page": 20,
        "sendtask_keyword": "",
        "sendtask_prestart": "all",
        "start_time": start,
        "time_field": "CreateTime"
    })
}

pub(crate) fn task_log_payload(sendtask_uuid: &str) -> Value {
    json!({
        "sendtask_uuid": sendtask_uuid,
        "record_page": 200,
        "search_keyword": "",
        "behavior_filter": 0,
        "etime": null,
        "order_method": "asc",
        "page_sn": 1,
        "search_order_by": "B",
        "search_send_result": "ALL",
        "sendlog_type": "test",
        "stime": null
    })
}

pub(crate) fn accounts_payload() -> Value {
    json!({
        "acct_name": "",
        "acct_stats": "enable",
        "end_time": null,
        "filter_time_range": 0,
        "order_field": "CreateTime",
        "order_method": "desc",
        "page_sn": 1,
        "record_page": 50,
        "start_time": null,
        "time_field": "UpdateTime"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_metadata_defaults() {
        let meta: TaskMetadata = serde_json::from_value(json!({"pause": true})).unwrap();
        assert!(meta.is_pause);
        assert_eq!(meta.stop_time_new, -1);
        assert_eq!(TaskMetadata::default().stop_time_new, -1);
    }

    #[test]
    fn test_tasks_payload_filter() {
        let all = tasks_payload(TaskFilter::All);
        assert_eq!(all["filter_time_range"], 0);
        assert!(all["start_time"].is_null());

        let today = tasks_payload(TaskFilter::CreatedBetween { start: 10, end: 20 });
        assert_eq!(today["filter_time_range"], 99);
        assert_eq!(today["start_time"], 10);
        assert_eq!(today["end_time"], 20);
    }
}
