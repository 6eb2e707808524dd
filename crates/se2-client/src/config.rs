//! Configuration types for se2-client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Se2Error;

/// Cookies that make up an SE2 session.
pub const DEFAULT_COOKIE_NAMES: &[&str] = &["type1", "type2", "type3"];

/// Configuration for connecting to the SE2 API.
#[derive(Debug, Clone)]
pub struct Se2Config {
    /// Base URL of the SE2 server (e.g., "https://se2.example.com").
    pub base_url: String,
    /// File holding the session cookie header.
    pub cookie_path: PathBuf,
    /// Extra PEM CA certificate trusted for the upstream TLS endpoint.
    pub ca_cert: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pause before each page request.
    pub page_delay: Duration,
    /// Cookie names kept from a token refresh.
    pub cookie_names: Vec<String>,
}

impl Se2Config {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_path: PathBuf::from("certs/cookie.txt"),
            ca_cert: None,
            timeout: Duration::from_secs(60),
            page_delay: Duration::from_millis(100),
            cookie_names: DEFAULT_COOKIE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SE2_BASE_URL` - Upstream base URL
    ///
    /// Optional (with defaults):
    /// - `SE2_COOKIE_PATH` - Default: certs/cookie.txt
    /// - `SE2_CA_CERT` - Default: unset
    /// - `SE2_TIMEOUT_SECS` - Default: 60
    /// - `SE2_PAGE_DELAY_MS` - Default: 100
    pub fn from_env() -> Result<Self, Se2Error> {
        let base_url = env::var("SE2_BASE_URL")
            .map_err(|_| Se2Error::Config("SE2_BASE_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Ok(path) = env::var("SE2_COOKIE_PATH") {
            config.cookie_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("SE2_CA_CERT") {
            if !path.is_empty() {
                config.ca_cert = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = env::var("SE2_TIMEOUT_SECS") {
            let secs = value
                .parse::<u64>()
                .map_err(|e| Se2Error::Config(format!("Invalid SE2_TIMEOUT_SECS: {}", e)))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = env::var("SE2_PAGE_DELAY_MS") {
            let ms = value
                .parse::<u64>()
                .map_err(|e| Se2Error::Config(format!("Invalid SE2_PAGE_DELAY_MS: {}", e)))?;
            config.page_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Builder method to set the cookie file.
    pub fn with_cookie_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Builder method to set the extra CA certificate.
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the delay between pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Full URL of an API path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
