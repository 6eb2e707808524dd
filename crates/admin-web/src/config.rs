//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Admin server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// HMAC secret for session tokens.
    pub jwt_secret: SecretString,
    /// Session token lifetime.
    pub jwt_expire: Duration,
    /// Email of the bootstrap administrator.
    pub admin_email: String,
    pub admin_password: SecretString,
    /// Directory for daily-rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ADMIN_ADDR` | Server bind address | `0.0.0.0:8000` |
    /// | `JWT_SECRET` | Token signing secret | (required) |
    /// | `JWT_EXPIRE_SECS` | Token lifetime | `86400` |
    /// | `ADMIN_EMAIL` | Bootstrap admin login | `admin` |
    /// | `ADMIN_PASSWORD` | Bootstrap admin password | (required) |
    /// | `LOG_DIR` | Log file directory | unset |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("ADMIN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expire = match env::var("JWT_EXPIRE_SECS") {
            Ok(raw) => raw
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid("JWT_EXPIRE_SECS"))?,
            Err(_) => Duration::from_secs(86_400),
        };

        let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin".to_string());
        let admin_password = env::var("ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?;

        Ok(Self {
            addr,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_expire,
            admin_email,
            admin_password: SecretString::from(admin_password),
            log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid ADMIN_ADDR format")]
    InvalidAddr,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {0}")]
    Invalid(&'static str),
}
