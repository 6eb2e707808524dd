//! Capture endpoints called from the landing page.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use database::sendlog::{Event, EventKind};
use database::Database;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::capture::{client_ip, parse_url_id};
use crate::error::{CaptureError, Result};

#[derive(Debug, Deserialize)]
pub struct Visit {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub url: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct Recorded {
    pub status: &'static str,
}

pub fn router(db: Database) -> Router {
    Router::new()
        .route("/api/visit", post(visit))
        .route("/api/login", post(login))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

/// Record a page visit in the recipient's `access_*` arrays.
pub async fn visit(
    State(db): State<Database>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<Visit>,
) -> Result<Json<Recorded>> {
    let device = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let event = Event {
        time: Utc::now().timestamp(),
        src: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        dev: device,
    };
    record(&db, &req.url, EventKind::Access, event).await
}

/// Record a credential submission in the recipient's `click_*` arrays.
/// The password is never read.
pub async fn login(
    State(db): State<Database>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<Login>,
) -> Result<Json<Recorded>> {
    let event = Event {
        time: Utc::now().timestamp(),
        src: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        dev: format!("login:{}", req.email.trim()),
    };
    record(&db, &req.url, EventKind::Click, event).await
}

async fn record(db: &Database, url: &str, kind: EventKind, event: Event) -> Result<Json<Recorded>> {
    let target = parse_url_id(url)?;
    if !db.table_exists(&target.table).await? {
        return Err(CaptureError::NotFound(format!("unknown campaign: {}", target.table)));
    }

    db.append_event(&target.table, &target.recipient, kind, &event).await?;
    info!(
        table = %target.table,
        recipient = %target.recipient,
        kind = %kind,
        src = %event.src,
        "Event captured"
    );
    Ok(Json(Recorded { status: "success" }))
}
