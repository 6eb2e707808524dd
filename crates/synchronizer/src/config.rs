//! Synchronizer configuration.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

use crate::error::SyncError;

/// What happens to a local task that disappeared upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Set `is_active = false`; keep the stats row and the log table.
    #[default]
    Deactivate,
    /// Delete the task and stats rows and drop the log table.
    Purge,
}

impl FromStr for RemovalPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deactivate" | "soft" => Ok(RemovalPolicy::Deactivate),
            "purge" | "hard" | "delete" => Ok(RemovalPolicy::Purge),
            other => Err(SyncError::Config(format!("unknown removal policy: {}", other))),
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalPolicy::Deactivate => write!(f, "deactivate"),
            RemovalPolicy::Purge => write!(f, "purge"),
        }
    }
}

/// Configuration for synchronization runs and the scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Offset of the local calendar used for "today" and daily triggers.
    pub utc_offset: FixedOffset,
    /// Tasks ending (or stopped) within this many days are mirrored.
    pub task_window_days: i64,
    pub removal_policy: RemovalPolicy,
    pub token_refresh_every: Duration,
    /// Local time of the daily statistics refresh.
    pub stats_at: NaiveTime,
    /// Local time of the daily task reconciliation.
    pub reconcile_at: NaiveTime,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or(Utc.fix()),
            task_window_days: 15,
            removal_policy: RemovalPolicy::Deactivate,
            token_refresh_every: Duration::from_secs(600),
            stats_at: NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN),
            reconcile_at: NaiveTime::from_hms_opt(1, 10, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SYNC_UTC_OFFSET_HOURS` | `8` |
    /// | `SYNC_TASK_WINDOW_DAYS` | `15` |
    /// | `SYNC_REMOVAL_POLICY` | `deactivate` |
    /// | `SYNC_TOKEN_REFRESH_SECS` | `600` |
    /// | `SYNC_STATS_AT` | `01:00` |
    /// | `SYNC_RECONCILE_AT` | `01:10` |
    pub fn from_env() -> Result<Self, SyncError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("SYNC_UTC_OFFSET_HOURS") {
            let hours = value
                .parse::<i32>()
                .map_err(|e| SyncError::Config(format!("Invalid SYNC_UTC_OFFSET_HOURS: {}", e)))?;
            config = config.with_utc_offset_hours(hours)?;
        }
        if let Ok(value) = env::var("SYNC_TASK_WINDOW_DAYS") {
            config.task_window_days = value
                .parse::<i64>()
                .map_err(|e| SyncError::Config(format!("Invalid SYNC_TASK_WINDOW_DAYS: {}", e)))?;
        }
        if let Ok(value) = env::var("SYNC_REMOVAL_POLICY") {
            config.removal_policy = value.parse()?;
        }
        if let Ok(value) = env::var("SYNC_TOKEN_REFRESH_SECS") {
            let secs = value
                .parse::<u64>()
                .map_err(|e| SyncError::Config(format!("Invalid SYNC_TOKEN_REFRESH_SECS: {}", e)))?;
            config.token_refresh_every = Duration::from_secs(secs.max(1));
        }
        if let Ok(value) = env::var("SYNC_STATS_AT") {
            config.stats_at = parse_time("SYNC_STATS_AT", &value)?;
        }
        if let Ok(value) = env::var("SYNC_RECONCILE_AT") {
            config.reconcile_at = parse_time("SYNC_RECONCILE_AT", &value)?;
        }

        Ok(config)
    }

    /// Builder method to set the local calendar offset.
    pub fn with_utc_offset_hours(mut self, hours: i32) -> Result<Self, SyncError> {
        self.utc_offset = hours
            .checked_mul(3600)
            .filter(|_| (-24..=24).contains(&hours))
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| SyncError::Config(format!("UTC offset out of range: {}", hours)))?;
        Ok(self)
    }

    /// Builder method to set the removal policy.
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Builder method to set the task window.
    pub fn with_task_window_days(mut self, days: i64) -> Self {
        self.task_window_days = days;
        self
    }
}

fn parse_time(name: &str, value: &str) -> Result<NaiveTime, SyncError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| SyncError::Config(format!("Invalid {} ({}): {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
        assert_eq!(config.task_window_days, 15);
        assert_eq!(config.removal_policy, RemovalPolicy::Deactivate);
        assert_eq!(config.token_refresh_every, Duration::from_secs(600));
        assert_eq!(config.stats_at, NaiveTime::from_hms_opt(1, 0, 0).unwrap());
        assert_eq!(config.reconcile_at, NaiveTime::from_hms_opt(1, 10, 0).unwrap());
    }

    #[test]
    fn test_removal_policy_parse() {
        assert_eq!("purge".parse::<RemovalPolicy>().unwrap(), RemovalPolicy::Purge);
        assert_eq!(" Deactivate ".parse::<RemovalPolicy>().unwrap(), RemovalPolicy::Deactivate);
        assert!("archive".parse::<RemovalPolicy>().is_err());
        assert_eq!(RemovalPolicy::Purge.to_string(), "purge");
    }

    #[test]
    fn test_offset_and_time_validation() {
        assert!(SyncConfig::default().with_utc_offset_hours(-5).is_ok());
        assert!(SyncConfig::default().with_utc_offset_hours(30).is_err());
        assert!(SyncConfig::default().with_utc_offset_hours(i32::MAX).is_err());
        assert!(SyncConfig::default().with_utc_offset_hours(i32::MIN).is_err());
        assert!(parse_time("X", "01:10").is_ok());
        assert!(parse_time("X", "25:00").is_err());
    }
}
