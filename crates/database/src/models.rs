//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::error::{DatabaseError, Result};
use crate::sql::{ColumnDef, Record};

/// A campaign mirrored from upstream (`sendtasks`).
///
/// Equality and hashing cover every mirrored field, so two snapshots of the
/// same task compare equal only when nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub sendtask_uuid: String,
    #[serde(default)]
    pub sendtask_id: Option<String>,
    /// Owner group ids; kept sorted.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sendtask_owner_gid: Vec<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub sendtask_create_ut: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pre_test_start_ut: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pre_test_end_ut: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pre_send_end_ut: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub test_start_ut: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub test_end_ut: i64,
    #[serde(default)]
    pub is_pause: bool,
    /// Stop-time override, `-1` when none.
    #[serde(default = "no_stop_time", deserialize_with = "lenient_stop_time")]
    pub stop_time_new: i64,
}

/// Columns of `sendtasks` mirrored from upstream, in a stable order.
pub const TASK_COLUMNS: &[&str] = &[
    "sendtask_uuid",
    "sendtask_id",
    "sendtask_owner_gid",
    "sendtask_create_ut",
    "pre_test_start_ut",
    "pre_test_end_ut",
    "pre_send_end_ut",
    "test_start_ut",
    "test_end_ut",
    "is_pause",
    "stop_time_new",
];

impl Task {
    /// Sort order-insensitive fields so snapshots compare by content.
    pub fn canonicalize(mut self) -> Self {
        self.sendtask_owner_gid.sort();
        self.sendtask_owner_gid.dedup();
        self
    }

    /// Whether the task's owner groups overlap `orgs`.
    pub fn visible_to(&self, orgs: &[String]) -> bool {
        self.sendtask_owner_gid.iter().any(|gid| orgs.contains(gid))
    }
}

/// A recipient row in a per-task log table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    /// Recipient id, unique within the task.
    pub uuid: String,
    #[serde(default)]
    pub target_email: Option<String>,
    #[serde(default)]
    pub template_uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub person_info: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub plan_time: i64,
    /// `0` when not sent yet.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub send_time: i64,
    #[serde(default, deserialize_with = "lenient_send_res")]
    pub send_res: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub access_time: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub access_src: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub access_dev: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub click_time: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub click_src: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub click_dev: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_time: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_src: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_dev: Vec<String>,
}

/// Log row columns filled from upstream. Event arrays are local only and
/// must never be overwritten by a refresh.
pub const LOG_UPSTREAM_COLUMNS: &[&str] = &[
    "uuid",
    "target_email",
    "template_uuid",
    "person_info",
    "plan_time",
    "send_time",
    "send_res",
];

/// Fixed schema of every per-task log table.
pub fn log_table_columns() -> Vec<ColumnDef> {
    let mut columns = vec![
        ColumnDef::new("id", "SERIAL PRIMARY KEY"),
        ColumnDef::new("uuid", "TEXT UNIQUE NOT NULL"),
        ColumnDef::new("target_email", "TEXT"),
        ColumnDef::new("template_uuid", "TEXT"),
        ColumnDef::new("person_info", "TEXT"),
        ColumnDef::new("plan_time", "BIGINT NOT NULL DEFAULT 0"),
        ColumnDef::new("send_time", "BIGINT NOT NULL DEFAULT 0"),
        ColumnDef::new("send_res", "TEXT"),
    ];
    for event in ["access", "click", "file"] {
        columns.push(ColumnDef::new(format!("{}_time", event), "BIGINT[] NOT NULL DEFAULT '{}'"));
        columns.push(ColumnDef::new(format!("{}_src", event), "TEXT[] NOT NULL DEFAULT '{}'"));
        columns.push(ColumnDef::new(format!("{}_dev", event), "TEXT[] NOT NULL DEFAULT '{}'"));
    }
    columns
}

impl LogRow {
    /// Record holding only the upstream columns.
    pub fn upstream_record(&self) -> Result<Record> {
        let mut record = to_record(self)?;
        record.retain(|k, _| LOG_UPSTREAM_COLUMNS.contains(&k.as_str()));
        Ok(record)
    }

    /// Whether the upstream send result reports success.
    pub fn succeeded(&self) -> bool {
        self.send_res
            .as_deref()
            .is_some_and(|res| res.starts_with("True"))
    }

    pub fn is_sent(&self) -> bool {
        self.send_time != 0
    }
}

/// Derived per-task counters (`sendlog_stats`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRow {
    pub sendtask_uuid: String,
    pub total_planned: i64,
    pub total_sent: i64,
    pub total_success: i64,
    pub today_planned: i64,
    pub today_sent: i64,
    pub today_success: i64,
    pub today_unsent: i64,
    pub today_earliest_plan_time: i64,
    pub today_latest_plan_time: i64,
    pub all_earliest_plan_time: i64,
    pub all_latest_plan_time: i64,
}

/// An upstream account (`accts`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub acct_uuid: String,
    /// Login email upstream; used to admit local registrations.
    pub acct_id: String,
    #[serde(default)]
    pub acct_email: Option<String>,
    #[serde(default)]
    pub acct_full_name: Option<String>,
    #[serde(default)]
    pub acct_full_name_2nd: Option<String>,
    /// Organization ids; kept sorted.
    #[serde(default, deserialize_with = "null_as_default")]
    pub orgs: Vec<String>,
    #[serde(default = "active", alias = "acct_activate", deserialize_with = "lenient_bool")]
    pub is_active: bool,
}

impl Account {
    pub fn canonicalize(mut self) -> Self {
        self.orgs.sort();
        self.orgs.dedup();
        self
    }
}

/// A local login (`users`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub acct_uuid: Option<String>,
    pub username: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub full_name: Option<String>,
    pub orgs: Vec<String>,
    pub create_time: DateTime<Utc>,
    pub is_active: bool,
}

/// A customer login owned by a user (`customers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i32,
    /// Email of the owning user.
    pub owner: String,
    pub customer_name: String,
    pub customer_full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Task UUIDs this customer may see.
    pub sendtasks: Vec<String>,
    pub create_time: DateTime<Utc>,
    pub is_active: bool,
}

/// Serialize a model into a record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DatabaseError::InvalidRecord(format!(
            "model serialized to non-object {}",
            other
        ))),
        Err(e) => Err(DatabaseError::InvalidRecord(e.to_string())),
    }
}

/// Deserialize a record into a model.
pub fn from_record<T: for<'de> Deserialize<'de>>(record: Record) -> Result<T> {
    serde_json::from_value(Value::Object(record)).map_err(|e| DatabaseError::InvalidRecord(e.to_string()))
}

fn no_stop_time() -> i64 {
    -1
}

fn active() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integers that may arrive as floats, numeric strings or null.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or_default(),
        _ => 0,
    })
}

fn lenient_stop_time<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(no_stop_time());
    }
    lenient_i64(value).map_err(serde::de::Error::custom)
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "enable" | "enabled"),
        _ => true,
    })
}

/// Upstream reports the send result as a bool or a string such as
/// `"True: 250 OK"`.
fn lenient_send_res<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_from_upstream_json() {
        let task: Task = serde_json::from_value(json!({
            "sendtask_uuid": "a1",
            "sendtask_id": "Q3 drill",
            "sendtask_owner_gid": ["g2", "g1"],
            "test_end_ut": 1700000000.0,
            "sendtask_create_ut": "1690000000",
            "stop_time_new": null,
            "unrelated": "ignored"
        }))
        .unwrap();

        assert_eq!(task.test_end_ut, 1_700_000_000);
        assert_eq!(task.sendtask_create_ut, 1_690_000_000);
        assert_eq!(task.stop_time_new, -1);
        assert!(!task.is_pause);

        let task = task.canonicalize();
        assert_eq!(task.sendtask_owner_gid, vec!["g1", "g2"]);
        assert!(task.visible_to(&["g2".to_string()]));
        assert!(!task.visible_to(&["g3".to_string()]));
    }

    #[test]
    fn test_task_missing_stop_time_defaults() {
        let task: Task = serde_json::from_value(json!({"sendtask_uuid": "a1"})).unwrap();
        assert_eq!(task.stop_time_new, -1);
        assert!(task.sendtask_owner_gid.is_empty());
    }

    #[test]
    fn test_task_record_round_trip_keeps_columns() {
        let task: Task = serde_json::from_value(json!({"sendtask_uuid": "a1"})).unwrap();
        let record = to_record(&task).unwrap();
        let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
        keys.sort();
        let mut expected = TASK_COLUMNS.to_vec();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_log_row_lenient_fields() {
        let row: LogRow = serde_json::from_value(json!({
            "id": 7,
            "uuid": "r1",
            "send_res": true,
            "person_info": {"dept": "IT"},
            "plan_time": 100,
            "click_time": null
        }))
        .unwrap();

        assert_eq!(row.send_res.as_deref(), Some("True"));
        assert!(row.succeeded());
        assert_eq!(row.person_info.as_deref(), Some("{\"dept\":\"IT\"}"));
        assert!(row.click_time.is_empty());
        assert!(!row.is_sent());

        let row: LogRow = serde_json::from_value(json!({"uuid": "r2", "send_res": "False: 550"})).unwrap();
        assert!(!row.succeeded());
        let row: LogRow = serde_json::from_value(json!({"uuid": "r3", "send_res": null})).unwrap();
        assert_eq!(row.send_res, None);
    }

    #[test]
    fn test_upstream_record_excludes_event_arrays() {
        let row: LogRow = serde_json::from_value(json!({"uuid": "r1", "plan_time": 5})).unwrap();
        let record = row.upstream_record().unwrap();
        assert_eq!(record.len(), LOG_UPSTREAM_COLUMNS.len());
        assert!(!record.contains_key("access_time"));
        assert_eq!(record["plan_time"], json!(5));
    }

    #[test]
    fn test_log_table_columns() {
        let columns = log_table_columns();
        assert_eq!(columns.len(), 17);
        assert_eq!(columns[0].name, "id");
        assert!(columns.iter().any(|c| c.name == "click_dev" && c.sql_type.starts_with("TEXT[]")));
    }

    #[test]
    fn test_account_activate_alias() {
        let account: Account = serde_json::from_value(json!({
            "acct_uuid": "u1",
            "acct_id": "alice@example.com",
            "acct_activate": 0,
            "orgs": ["o2", "o1", "o2"]
        }))
        .unwrap();
        assert!(!account.is_active);
        assert_eq!(account.canonicalize().orgs, vec!["o1", "o2"]);
    }
}
