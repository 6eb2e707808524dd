//! Route handlers for the admin API.

pub mod customers;
pub mod health;
pub mod stats;
pub mod tasks;
pub mod users;

use axum::routing::{get, post};
use axum::{Json, Router};
use database::models::{from_record, TASK_COLUMNS};
use database::{PageQuery, Select, Task};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::auth::Claims;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Largest page a client may request.
const MAX_ROWS_PER_PAGE: u32 = 500;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Accounts and sessions
        .route("/api/register", post(users::register))
        .route("/api/login", post(users::login))
        .route("/api/profile", get(users::profile))
        .route("/api/profile/password", post(users::change_password))
        // Mirrored data
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/reconcile", post(tasks::reconcile))
        .route("/api/tasks/:uuid/logs", get(tasks::task_logs))
        .route("/api/stats", get(stats::list_stats))
        .route("/api/stats/refresh", post(stats::refresh))
        // Customers
        .route(
            "/api/customers",
            get(customers::list).post(customers::create),
        )
        .route("/api/customers/:name/tasks", post(customers::assign_tasks))
        .layer(TraceLayer::new_for_http())
}

/// Success envelope: `{"status": "success", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data,
    })
}

/// `?page=&rows=` query parameters. Pages are zero-based.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub rows: Option<u32>,
}

impl PageParams {
    /// Apply a window when `rows` is given.
    pub fn apply(&self, query: PageQuery) -> PageQuery {
        match self.rows {
            Some(rows) => query.page(self.page.unwrap_or(0), rows.clamp(1, MAX_ROWS_PER_PAGE)),
            None => query,
        }
    }
}

/// Load an active task the caller may see. Tasks outside the caller's
/// organizations are reported as missing.
pub(crate) async fn visible_task(state: &AppState, claims: &Claims, uuid: &str) -> Result<Task> {
    let record = state
        .db()
        .select(
            "sendtasks",
            &Select::all()
                .columns(TASK_COLUMNS.iter().copied())
                .filter_eq("sendtask_uuid", uuid),
        )
        .await?
        .into_iter()
        .next();

    let not_found = || ApiError::NotFound(format!("task not found: {}", uuid));
    let task: Task = from_record(record.ok_or_else(not_found)?)?;
    if claims.is_admin() || task.visible_to(&claims.orgs) {
        Ok(task)
    } else {
        Err(not_found())
    }
}

/// UUIDs of active tasks visible to the caller.
pub(crate) async fn visible_task_uuids(state: &AppState, claims: &Claims) -> Result<Vec<String>> {
    let records = state
        .db()
        .select("sendtasks", &Select::all().columns(TASK_COLUMNS.iter().copied()))
        .await?;

    let mut uuids = Vec::new();
    for record in records {
        let task: Task = from_record(record)?;
        if claims.is_admin() || task.visible_to(&claims.orgs) {
            uuids.push(task.sendtask_uuid);
        }
    }
    Ok(uuids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params() {
        let none = PageParams::default().apply(PageQuery::new());
        assert_eq!(none.window, None);

        let params = PageParams {
            page: Some(2),
            rows: Some(10_000),
        };
        assert_eq!(params.apply(PageQuery::new()).window, Some((2, MAX_ROWS_PER_PAGE)));

        let params = PageParams {
            page: None,
            rows: Some(0),
        };
        assert_eq!(params.apply(PageQuery::new()).window, Some((0, 1)));
    }

    #[test]
    fn test_envelope() {
        let Json(body) = ok(vec![1, 2]);
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"status": "success", "data": [1, 2]})
        );
    }
}
