//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database: DatabaseConfig,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `CAPTURE_ADDR` | `0.0.0.0:8080` |
    /// | `DATABASE_URL`, `DATABASE_POOL_SIZE` | see [`DatabaseConfig::from_env`] |
    /// | `LOG_DIR` | unset |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("CAPTURE_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        Ok(Self {
            addr,
            database: DatabaseConfig::from_env(),
            log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CAPTURE_ADDR format")]
    InvalidAddr,
}
