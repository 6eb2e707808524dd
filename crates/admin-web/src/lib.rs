//! Admin API for the SE2 mirror.
//!
//! JSON endpoints over the mirrored tasks, logs and statistics, local
//! logins with JWT sessions, and customer management.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// The full application with state attached.
pub fn app(state: AppState) -> Router {
    routes::router().with_state(state)
}
