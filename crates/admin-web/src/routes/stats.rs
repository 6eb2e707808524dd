//! Per-task statistics.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use database::models::from_record;
use database::{Select, StatsRow};
use serde::Deserialize;
use synchronizer::SyncStatus;
use tracing::info;

use super::{ok, visible_task, visible_task_uuids, Envelope};
use crate::auth::Claims;
use crate::error::Result;
use crate::state::AppState;

/// Statistics rows of the tasks visible to the caller.
pub async fn list_stats(State(state): State<AppState>, claims: Claims) -> Result<Json<Envelope<Vec<StatsRow>>>> {
    let uuids = visible_task_uuids(&state, &claims).await?;
    let records = state
        .db()
        .select("sendlog_stats", &Select::all().filter_in("sendtask_uuid", uuids))
        .await?;

    let rows = records
        .into_iter()
        .map(from_record)
        .collect::<std::result::Result<Vec<StatsRow>, _>>()?;
    Ok(ok(rows))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// Tasks to refresh; every active task when absent (administrators only).
    #[serde(default)]
    pub uuids: Option<Vec<String>>,
}

/// Refresh logs and statistics now.
pub async fn refresh(
    State(state): State<AppState>,
    claims: Claims,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<Envelope<BTreeMap<String, SyncStatus>>>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let statuses = match request.uuids {
        Some(uuids) => {
            for uuid in &uuids {
                visible_task(&state, &claims, uuid).await?;
            }
            state.sync.refresh_stats(&uuids).await?
        }
        None => {
            claims.require_admin()?;
            state.sync.refresh_all_stats().await?
        }
    };

    info!(requested_by = %claims.sub, tasks = statuses.len(), "Manual statistics refresh");
    Ok(ok(statuses))
}
