//! End-to-end synchronization runs against a live PostgreSQL with a stubbed
//! upstream.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p synchronizer -- --ignored`.
//! The tests write to the shared `sendtasks` and `sendlog_stats` tables, so
//! point them at a scratch database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use database::sendlog::log_table_name;
use database::{Account, Database, LogRow, Select, StatsRow, Task};
use se2_client::{RemoteSource, Se2Error, TaskFilter, TaskMetadata};
use serde_json::json;
use synchronizer::{RemovalPolicy, SyncConfig, SyncError, SyncStatus, Synchronizer, TaskScope};

/// Reconciliation removes every in-scope task the stub does not list, so
/// runs against the shared table must not overlap.
fn reconcile_lock() -> &'static tokio::sync::Mutex<()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

#[derive(Default)]
struct StubRemote {
    tasks: Mutex<Option<Vec<Task>>>,
    logs: Mutex<HashMap<String, Option<Vec<LogRow>>>>,
    metadata: Mutex<HashMap<String, TaskMetadata>>,
}

impl StubRemote {
    fn set_tasks(&self, tasks: Option<Vec<Task>>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    fn set_log(&self, uuid: &str, rows: Option<Vec<LogRow>>) {
        self.logs.lock().unwrap().insert(uuid.to_string(), rows);
    }

    fn set_metadata(&self, uuid: &str, meta: Option<TaskMetadata>) {
        let mut metadata = self.metadata.lock().unwrap();
        match meta {
            Some(meta) => metadata.insert(uuid.to_string(), meta),
            None => metadata.remove(uuid),
        };
    }
}

#[async_trait]
impl RemoteSource for StubRemote {
    async fn fetch_tasks(&self, _filter: TaskFilter) -> Option<Vec<Task>> {
        self.tasks.lock().unwrap().clone()
    }

    async fn fetch_task_metadata(&self, sendtask_uuid: &str) -> Option<TaskMetadata> {
        self.metadata.lock().unwrap().get(sendtask_uuid).copied()
    }

    async fn fetch_task_log(&self, sendtask_uuid: &str) -> Option<Vec<LogRow>> {
        self.logs
            .lock()
            .unwrap()
            .get(sendtask_uuid)
            .cloned()
            .unwrap_or(Some(Vec::new()))
    }

    async fn fetch_accounts(&self) -> Option<Vec<Account>> {
        Some(Vec::new())
    }

    async fn refresh_credentials(&self) -> Result<(), Se2Error> {
        Ok(())
    }
}

async fn connect() -> Database {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let db = Database::connect(&url).await.expect("connect");
    db.bootstrap().await.expect("bootstrap");
    db
}

fn task(uuid: &str, test_start_ut: i64) -> Task {
    let now = Utc::now().timestamp();
    serde_json::from_value(json!({
        "sendtask_uuid": uuid,
        "sendtask_id": "campaign",
        "sendtask_owner_gid": ["g2", "g1"],
        "sendtask_create_ut": now,
        "test_start_ut": test_start_ut,
        "test_end_ut": now,
    }))
    .unwrap()
}

/// A task that ended a month ago; only a stop-time override keeps it recent.
fn old_task(uuid: &str) -> Task {
    let now = Utc::now().timestamp();
    serde_json::from_value(json!({
        "sendtask_uuid": uuid,
        "sendtask_id": "old campaign",
        "sendtask_owner_gid": ["g1"],
        "sendtask_create_ut": now - 40 * 86_400,
        "test_start_ut": now - 35 * 86_400,
        "test_end_ut": now - 30 * 86_400,
    }))
    .unwrap()
}

fn log_row(uuid: &str, send_time: i64, send_res: &str) -> LogRow {
    serde_json::from_value(json!({
        "uuid": uuid,
        "target_email": format!("{}@example.com", uuid),
        "plan_time": 100,
        "send_time": send_time,
        "send_res": send_res,
    }))
    .unwrap()
}

async fn stats_for(db: &Database, uuid: &str) -> Option<StatsRow> {
    db.select("sendlog_stats", &Select::all().filter_eq("sendtask_uuid", uuid))
        .await
        .unwrap()
        .into_iter()
        .next()
        .map(|r| database::models::from_record(r).unwrap())
}

async fn stop_time(db: &Database, uuid: &str) -> Option<i64> {
    db.select(
        "sendtasks",
        &Select::all()
            .columns(["stop_time_new"])
            .filter_eq("sendtask_uuid", uuid)
            .include_inactive(),
    )
    .await
    .unwrap()
    .into_iter()
    .next()
    .and_then(|r| r.get("stop_time_new").and_then(|v| v.as_i64()))
}

async fn is_active(db: &Database, uuid: &str) -> Option<bool> {
    db.select(
        "sendtasks",
        &Select::all()
            .columns(["is_active"])
            .filter_eq("sendtask_uuid", uuid)
            .include_inactive(),
    )
    .await
    .unwrap()
    .into_iter()
    .next()
    .and_then(|r| r.get("is_active").and_then(|v| v.as_bool()))
}

fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
#[ignore]
async fn test_reconcile_lifecycle_under_both_policies() {
    let _serial = reconcile_lock().lock().await;
    let db = connect().await;
    let remote = Arc::new(StubRemote::default());
    let soft = Synchronizer::new(db.clone(), remote.clone(), SyncConfig::default());
    let hard = Synchronizer::new(
        db.clone(),
        remote.clone(),
        SyncConfig::default().with_removal_policy(RemovalPolicy::Purge),
    );

    let a = new_uuid();
    let b = new_uuid();
    remote.set_log(&a, Some(vec![log_row("r1", 150, "True"), log_row("r2", 0, "")]));
    remote.set_tasks(Some(vec![task(&a, 1), task(&b, 1)]));

    // First pass inserts both and computes their stats
    let report = soft.reconcile_tasks(TaskScope::Recent).await.unwrap();
    assert!(report.changed.contains(&a) && report.changed.contains(&b));
    assert_eq!(report.stats.get(&a), Some(&SyncStatus::Changed));
    let stats = stats_for(&db, &a).await.expect("stats row");
    assert_eq!(stats.total_planned, 2);
    assert_eq!(stats.total_sent, 1);
    assert_eq!(stats.total_success, 1);
    assert!(db.table_exists(&log_table_name(&b).unwrap()).await.unwrap());

    // Nothing changed upstream
    let report = soft.reconcile_tasks(TaskScope::Recent).await.unwrap();
    assert!(report.changed.is_empty());
    assert!(!report.removed.contains(&a) && !report.removed.contains(&b));

    // A field change is an update, not a removal
    remote.set_tasks(Some(vec![task(&a, 2), task(&b, 1)]));
    let report = soft.reconcile_tasks(TaskScope::Recent).await.unwrap();
    assert_eq!(report.changed, vec![a.clone()]);
    assert!(!report.removed.contains(&a));
    assert_eq!(is_active(&db, &a).await, Some(true));

    // Soft removal keeps the row, stats and log table
    remote.set_tasks(Some(vec![task(&a, 2)]));
    let report = soft.reconcile_tasks(TaskScope::Recent).await.unwrap();
    assert!(report.removed.contains(&b));
    assert_eq!(is_active(&db, &b).await, Some(false));
    assert!(stats_for(&db, &b).await.is_some());
    assert!(db.table_exists(&log_table_name(&b).unwrap()).await.unwrap());
    assert!(!soft.active_task_uuids().await.unwrap().contains(&b));

    // Hard removal deletes everything
    remote.set_tasks(Some(vec![]));
    let report = hard.reconcile_tasks(TaskScope::Recent).await.unwrap();
    assert!(report.removed.contains(&a));
    assert_eq!(is_active(&db, &a).await, None);
    assert!(stats_for(&db, &a).await.is_none());
    assert!(!db.table_exists(&log_table_name(&a).unwrap()).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_failed_metadata_keeps_stopped_task_under_both_policies() {
    let _serial = reconcile_lock().lock().await;
    let db = connect().await;
    let remote = Arc::new(StubRemote::default());
    let now = Utc::now().timestamp();

    for policy in [RemovalPolicy::Deactivate, RemovalPolicy::Purge] {
        let sync = Synchronizer::new(
            db.clone(),
            remote.clone(),
            SyncConfig::default().with_removal_policy(policy),
        );
        let uuid = new_uuid();
        let stopped = now - 86_400;
        remote.set_tasks(Some(vec![old_task(&uuid)]));
        remote.set_log(&uuid, Some(vec![log_row("r1", 150, "True")]));
        remote.set_metadata(
            &uuid,
            Some(TaskMetadata {
                is_pause: true,
                stop_time_new: stopped,
            }),
        );

        // Metadata available: the stop time brings the task into scope
        let report = sync.reconcile_tasks(TaskScope::Recent).await.unwrap();
        assert!(report.changed.contains(&uuid), "{:?}", policy);
        assert_eq!(stop_time(&db, &uuid).await, Some(stopped));

        // Metadata lookup fails: the task is still listed upstream, so it
        // stays, keeps its stored stop time and is not rewritten
        remote.set_metadata(&uuid, None);
        let report = sync.reconcile_tasks(TaskScope::Recent).await.unwrap();
        assert!(!report.removed.contains(&uuid), "{:?}", policy);
        assert!(!report.changed.contains(&uuid), "{:?}", policy);
        assert_eq!(is_active(&db, &uuid).await, Some(true));
        assert_eq!(stop_time(&db, &uuid).await, Some(stopped));
        assert!(stats_for(&db, &uuid).await.is_some());
        assert!(db.table_exists(&log_table_name(&uuid).unwrap()).await.unwrap());

        // Once it is really gone upstream the policy applies
        remote.set_tasks(Some(vec![]));
        let report = sync.reconcile_tasks(TaskScope::Recent).await.unwrap();
        assert!(report.removed.contains(&uuid), "{:?}", policy);
    }
}

#[tokio::test]
#[ignore]
async fn test_missing_log_leaves_stats_untouched() {
    let db = connect().await;
    let remote = Arc::new(StubRemote::default());
    let sync = Synchronizer::new(db.clone(), remote.clone(), SyncConfig::default());
    let uuid = new_uuid();

    remote.set_log(&uuid, Some(vec![log_row("r1", 150, "True")]));
    let statuses = sync.refresh_stats(&[uuid.clone()]).await.unwrap();
    assert_eq!(statuses[&uuid], SyncStatus::Changed);
    let before = stats_for(&db, &uuid).await.unwrap();

    remote.set_log(&uuid, None);
    let statuses = sync.refresh_stats(&[uuid.clone()]).await.unwrap();
    assert_eq!(statuses[&uuid], SyncStatus::Skipped);
    assert_eq!(stats_for(&db, &uuid).await.unwrap(), before);

    // Same data again is a no-op
    remote.set_log(&uuid, Some(vec![log_row("r1", 150, "True")]));
    let statuses = sync.refresh_stats(&[uuid.clone()]).await.unwrap();
    assert_eq!(statuses[&uuid], SyncStatus::Unchanged);

    db.drop_table(&log_table_name(&uuid).unwrap()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_log_refresh_keeps_captured_events() {
    use database::sendlog::{Event, EventKind};

    let db = connect().await;
    let remote = Arc::new(StubRemote::default());
    let sync = Synchronizer::new(db.clone(), remote.clone(), SyncConfig::default());
    let uuid = new_uuid();

    remote.set_log(&uuid, Some(vec![log_row("r1", 0, "")]));
    sync.sync_task_logs(&[uuid.clone()]).await.unwrap();

    let table = log_table_name(&uuid).unwrap();
    let event = Event {
        time: 42,
        src: "10.0.0.1".into(),
        dev: "curl".into(),
    };
    db.append_event(&table, "r1", EventKind::Access, &event).await.unwrap();

    remote.set_log(&uuid, Some(vec![log_row("r1", 150, "True")]));
    let statuses = sync.sync_task_logs(&[uuid.clone()]).await.unwrap();
    assert_eq!(statuses[&uuid], SyncStatus::Changed);

    let rows = db.select(&table, &Select::all()).await.unwrap();
    assert_eq!(rows[0]["access_time"], json!([42]));
    assert_eq!(rows[0]["send_time"], json!(150));

    db.drop_table(&table).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_failed_task_fetch_aborts_before_changes() {
    let _serial = reconcile_lock().lock().await;
    let db = connect().await;
    let remote = Arc::new(StubRemote::default());
    let sync = Synchronizer::new(db, remote.clone(), SyncConfig::default());

    remote.set_tasks(None);
    let err = sync.reconcile_tasks(TaskScope::Recent).await.unwrap_err();
    assert!(matches!(err, SyncError::Upstream { .. }));
}
