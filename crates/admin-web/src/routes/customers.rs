//! Customer logins owned by the caller.

use axum::extract::{Path, State};
use axum::Json;
use database::customer::{create_customer, list_customers, set_customer_tasks};
use database::Customer;
use serde::Deserialize;
use tracing::info;

use super::{ok, visible_task, Envelope};
use crate::auth::{hash_password, Claims};
use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCustomer {
    pub customer_name: String,
    #[serde(default)]
    pub customer_full_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskAssignment {
    pub sendtasks: Vec<String>,
}

pub async fn list(State(state): State<AppState>, claims: Claims) -> Result<Json<Envelope<Vec<Customer>>>> {
    let pool = state.db().pool().await?;
    let customers = list_customers(&pool, &claims.sub).await?;
    Ok(ok(customers))
}

pub async fn create(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<NewCustomer>,
) -> Result<Json<Envelope<Customer>>> {
    let name = req.customer_name.trim();
    if name.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("customer_name and password are required".to_string()));
    }

    let pool = state.db().pool().await?;
    let customer = create_customer(
        &pool,
        &claims.sub,
        name,
        req.customer_full_name.as_deref(),
        &hash_password(&req.password)?,
    )
    .await?;

    info!(owner = %claims.sub, customer = %customer.customer_name, "Customer created");
    Ok(ok(customer))
}

/// Replace the tasks a customer may see. Only tasks visible to the caller
/// can be assigned.
pub async fn assign_tasks(
    State(state): State<AppState>,
    claims: Claims,
    Path(name): Path<String>,
    Json(req): Json<TaskAssignment>,
) -> Result<Json<Envelope<Customer>>> {
    for uuid in &req.sendtasks {
        visible_task(&state, &claims, uuid).await?;
    }

    let pool = state.db().pool().await?;
    let customer = set_customer_tasks(&pool, &claims.sub, &name, &req.sendtasks).await?;

    info!(owner = %claims.sub, customer = %name, tasks = customer.sendtasks.len(), "Customer tasks assigned");
    Ok(ok(customer))
}
