//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use synchronizer::Synchronizer;

use crate::auth::JwtKeys;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Synchronization context; owns the database handle.
    pub sync: Synchronizer,
    pub keys: Arc<JwtKeys>,
}

impl AppState {
    /// Create new application state.
    pub fn new(sync: Synchronizer, keys: JwtKeys) -> Self {
        Self {
            sync,
            keys: Arc::new(keys),
        }
    }

    pub fn db(&self) -> &Database {
        self.sync.db()
    }
}
