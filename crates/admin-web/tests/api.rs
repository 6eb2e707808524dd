//! Router tests that need no database: authentication and authorization
//! are decided before any query runs.

use std::sync::Arc;
use std::time::Duration;

use admin_web::auth::{JwtKeys, ADMIN_ORG};
use admin_web::state::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use database::{Account, Database, DatabaseConfig, LogRow, Task};
use secrecy::SecretString;
use se2_client::{RemoteSource, Se2Error, TaskFilter, TaskMetadata};
use serde_json::{json, Value};
use synchronizer::{SyncConfig, Synchronizer};
use tower::ServiceExt;

/// Upstream that is always down.
struct Offline;

#[async_trait]
impl RemoteSource for Offline {
    async fn fetch_tasks(&self, _filter: TaskFilter) -> Option<Vec<Task>> {
        None
    }

    async fn fetch_task_metadata(&self, _sendtask_uuid: &str) -> Option<TaskMetadata> {
        None
    }

    async fn fetch_task_log(&self, _sendtask_uuid: &str) -> Option<Vec<LogRow>> {
        None
    }

    async fn fetch_accounts(&self) -> Option<Vec<Account>> {
        None
    }

    async fn refresh_credentials(&self) -> Result<(), Se2Error> {
        Err(Se2Error::MissingCookie)
    }
}

fn keys() -> JwtKeys {
    JwtKeys::new(&SecretString::from("test-secret"), Duration::from_secs(3600))
}

fn app() -> Router {
    // Never connected: these requests must not reach the database
    let db = Database::new(DatabaseConfig::new("postgres://127.0.0.1:1/unused"));
    let sync = Synchronizer::new(db, Arc::new(Offline), SyncConfig::default());
    admin_web::app(AppState::new(sync, keys()))
}

fn bearer(orgs: &[&str]) -> String {
    let orgs: Vec<String> = orgs.iter().map(|o| o.to_string()).collect();
    format!("Bearer {}", keys().issue("user@example.com", &orgs).unwrap())
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (status, body) = send(Request::builder().uri("/api/tasks").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "missing authorization token");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let (status, body) = send(
        Request::builder()
            .uri("/api/profile")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_reconcile_requires_admin() {
    let (status, body) = send(
        Request::builder()
            .method("POST")
            .uri("/api/tasks/reconcile")
            .header(header::AUTHORIZATION, bearer(&["g1"]))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "administrator access required");
}

#[tokio::test]
async fn test_refresh_all_stats_requires_admin() {
    let (status, _) = send(
        Request::builder()
            .method("POST")
            .uri("/api/stats/refresh")
            .header(header::AUTHORIZATION, bearer(&["g1"]))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reconcile_with_upstream_down_is_bad_gateway() {
    let (status, body) = send(
        Request::builder()
            .method("POST")
            .uri("/api/tasks/reconcile")
            .header(header::AUTHORIZATION, bearer(&[ADMIN_ORG]))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"scope": "created_today"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
}
