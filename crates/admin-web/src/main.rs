//! Admin server for the SE2 mirror.
//!
//! Serves the JSON API and runs the synchronization scheduler.

use std::sync::Arc;

use admin_web::auth::{bootstrap_admin, JwtKeys};
use admin_web::config::Config;
use admin_web::state::AppState;
use admin_web::telemetry;
use database::{Database, DatabaseConfig};
use se2_client::{FileCredentialStore, Se2Client, Se2Config};
use synchronizer::{start_scheduler, SyncConfig, Synchronizer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    let _log_guard = telemetry::init(config.log_dir.as_deref(), "admin-web");
    info!(addr = %config.addr, "Starting admin server");

    let db = Database::new(DatabaseConfig::from_env());
    db.bootstrap().await?;

    let se2 = Se2Config::from_env()?;
    let credentials = Arc::new(FileCredentialStore::new(se2.cookie_path.clone()));
    let client = Se2Client::new(se2, credentials)?;
    let sync = Synchronizer::new(db.clone(), Arc::new(client), SyncConfig::from_env()?);

    bootstrap_admin(&db, &config.admin_email, &config.admin_password).await?;

    // Upstream may be unreachable at start; the scheduled jobs catch up later
    if let Err(e) = sync.initialize().await {
        warn!(error = %e, "Initial population incomplete");
    }
    let scheduler = start_scheduler(sync.clone());

    let state = AppState::new(sync, JwtKeys::new(&config.jwt_secret, config.jwt_expire));
    let app = admin_web::app(state);

    info!(addr = %config.addr, "Admin server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    db.close().await;
    info!("Admin server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
