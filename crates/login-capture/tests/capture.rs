//! Capture endpoint tests.
//!
//! The database-backed cases are ignored by default; run them with
//! `DATABASE_URL=postgres://... cargo test -p login-capture -- --ignored`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use database::models::log_table_columns;
use database::{Database, DatabaseConfig, Select};
use serde_json::{json, Value};
use tower::ServiceExt;

fn offline_app() -> Router {
    // Never connected: malformed links are rejected before any query
    login_capture::router(Database::new(DatabaseConfig::new("postgres://127.0.0.1:1/unused")))
}

async fn post(app: Router, uri: &str, body: Value, forwarded_for: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::USER_AGENT, "test-agent/1.0")
                .header("x-forwarded-for", forwarded_for)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_short_link_is_bad_request() {
    let (status, body) = post(
        offline_app(),
        "/api/visit",
        json!({"url": "https://host/login/abc"}),
        "203.0.113.5",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_link_with_invalid_table_is_bad_request() {
    let url_id = format!("{}{}{}", "h".repeat(16), ".".repeat(32), "t".repeat(16));
    let (status, _) = post(
        offline_app(),
        "/api/login",
        json!({"url": format!("https://host/login/{}", url_id), "email": "a@b.c"}),
        "203.0.113.5",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_visit_and_login_append_events() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let db = Database::connect(&url).await.expect("connect");

    let table = uuid::Uuid::new_v4().simple().to_string();
    db.create_table(&table, &log_table_columns()).await.unwrap();

    let head = "0123456789abcdef";
    let tail = "fedcba9876543210";
    let recipient = format!("{}{}", tail, head);
    let mut row = database::Record::new();
    row.insert("uuid".into(), json!(recipient));
    db.insert_one(&table, row).await.unwrap();

    let link = format!("https://host/login/{}{}{}?reurl=x", head, table, tail);
    let app = login_capture::router(db.clone());

    let (status, body) = post(app.clone(), "/api/visit", json!({"url": link}), "203.0.113.5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _) = post(
        app.clone(),
        "/api/login",
        json!({"url": link, "email": "victim@example.com", "password": "ignored"}),
        "203.0.113.6",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = db.select(&table, &Select::all()).await.unwrap();
    assert_eq!(rows[0]["access_src"], json!(["203.0.113.5"]));
    assert_eq!(rows[0]["access_dev"], json!(["test-agent/1.0"]));
    assert_eq!(rows[0]["click_src"], json!(["203.0.113.6"]));
    assert_eq!(rows[0]["click_dev"], json!(["login:victim@example.com"]));

    // Unknown recipient in a known table
    let stranger = format!("https://host/login/{}{}{}", "x".repeat(16), table, "y".repeat(16));
    let (status, _) = post(app.clone(), "/api/visit", json!({"url": stranger}), "203.0.113.7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown table
    let other = uuid::Uuid::new_v4().simple().to_string();
    let missing = format!("https://host/login/{}{}{}", head, other, tail);
    let (status, _) = post(app, "/api/visit", json!({"url": missing}), "203.0.113.7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    db.drop_table(&table).await.unwrap();
}
