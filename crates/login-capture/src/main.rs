//! Capture server for landing-page events.

use std::net::SocketAddr;

use database::Database;
use login_capture::config::Config;
use login_capture::telemetry;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let _log_guard = telemetry::init(config.log_dir.as_deref());

    info!(addr = %config.addr, "Starting capture server");

    let db = Database::new(config.database.clone());
    db.bootstrap().await?;

    let app = login_capture::router(db.clone());
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Capture server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    db.close().await;
    info!("Capture server stopped");
    Ok(())
}
