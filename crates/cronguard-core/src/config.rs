//! SchedulerConfig - スケジューラの設定（TOML）
//!
//! ```toml
//! pool_size = 10
//! timezone = "Asia/Tokyo"
//! lock_failure_policy = "fail_open"
//! shutdown_grace_seconds = 30
//!
//! [store]
//! redis_url = "redis://127.0.0.1:6379/"
//! ```
//! 省略したキーはすべてデフォルト値になります。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// What the execution wrapper does when the lock store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockFailurePolicy {
    /// Run the task without a lock. Mutual exclusion is lost until the store returns.
    #[default]
    FailOpen,
    /// Skip the run.
    FailClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of task invocations running at once in this process.
    pub pool_size: u32,
    /// Prefix for runtime worker thread names.
    pub thread_name_prefix: String,
    /// IANA zone cron expressions are evaluated in.
    pub timezone: String,
    pub lock_failure_policy: LockFailurePolicy,
    /// How long shutdown waits for in-flight invocations before abandoning them.
    pub shutdown_grace_seconds: u64,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            thread_name_prefix: "cronguard-".to_string(),
            timezone: "UTC".to_string(),
            lock_failure_policy: LockFailurePolicy::FailOpen,
            shutdown_grace_seconds: 30,
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool_size as usize > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "pool_size",
                reason: format!("must not exceed {}", tokio::sync::Semaphore::MAX_PERMITS),
            });
        }
        self.time_zone()?;
        if self.store.redis_url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "store.redis_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| ConfigError::Invalid {
            field: "timezone",
            reason: e.to_string(),
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.time_zone().unwrap(), Tz::UTC);
    }

    #[test]
    fn parses_all_fields() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            pool_size = 4
            thread_name_prefix = "jobs-"
            timezone = "Asia/Tokyo"
            lock_failure_policy = "fail_closed"
            shutdown_grace_seconds = 5

            [store]
            redis_url = "redis://cache:6379/2"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool_size, 4);
        assert_eq!(config.thread_name_prefix, "jobs-");
        assert_eq!(config.time_zone().unwrap(), Tz::Asia__Tokyo);
        assert_eq!(config.lock_failure_policy, LockFailurePolicy::FailClosed);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.store.redis_url, "redis://cache:6379/2");
    }

    #[test]
    fn rejects_zero_pool_size() {
        let err = SchedulerConfig::from_toml_str("pool_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pool_size", .. }));
    }

    #[test]
    fn rejects_unknown_time_zone() {
        let err = SchedulerConfig::from_toml_str(r#"timezone = "Mars/Olympus""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "timezone", .. }));
    }
}
