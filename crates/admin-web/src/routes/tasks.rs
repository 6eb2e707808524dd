//! Task listing, logs and on-demand reconciliation.

use axum::extract::{Path, Query, State};
use axum::Json;
use database::sendlog::log_table_name;
use database::{OrderBy, Page, PageQuery, SqlParam};
use serde::Deserialize;
use synchronizer::{ReconcileReport, TaskScope};
use tracing::info;

use super::{ok, visible_task, Envelope, PageParams};
use crate::auth::Claims;
use crate::error::Result;
use crate::state::AppState;

/// Active tasks visible to the caller, newest first.
pub async fn list_tasks(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<PageParams>,
) -> Result<Json<Envelope<Page>>> {
    let mut query = PageQuery::new()
        .filter("t.\"is_active\" = $?", SqlParam::Bool(true))
        .order_by(OrderBy::desc("sendtask_create_ut"));
    if !claims.is_admin() {
        query = query.filter(
            "t.\"sendtask_owner_gid\" && $?",
            SqlParam::TextArray(claims.orgs.clone()),
        );
    }

    let page = state.db().select_page("sendtasks", &params.apply(query)).await?;
    Ok(ok(page))
}

/// Recipient rows of one task, by planned send time.
pub async fn task_logs(
    State(state): State<AppState>,
    claims: Claims,
    Path(uuid): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Envelope<Page>>> {
    visible_task(&state, &claims, &uuid).await?;

    let table = log_table_name(&uuid)?;
    if !state.db().table_exists(&table).await? {
        return Ok(ok(Page::default()));
    }

    let query = params.apply(PageQuery::new().order_by(OrderBy::asc("plan_time")));
    let page = state.db().select_page(&table, &query).await?;
    Ok(ok(page))
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeParam {
    #[default]
    Recent,
    CreatedToday,
}

impl From<ScopeParam> for TaskScope {
    fn from(scope: ScopeParam) -> Self {
        match scope {
            ScopeParam::Recent => TaskScope::Recent,
            ScopeParam::CreatedToday => TaskScope::CreatedToday,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub scope: ScopeParam,
}

/// Run a reconciliation now. Administrators only.
pub async fn reconcile(
    State(state): State<AppState>,
    claims: Claims,
    body: Option<Json<ReconcileRequest>>,
) -> Result<Json<Envelope<ReconcileReport>>> {
    claims.require_admin()?;
    let scope: TaskScope = body.map(|Json(b)| b.scope).unwrap_or_default().into();

    info!(requested_by = %claims.sub, scope = ?scope, "Manual reconciliation");
    let report = state.sync.reconcile_tasks(scope).await?;
    Ok(ok(report))
}
