//! Configuration management for the marquee coordinator
//!
//! This module handles loading and validating configuration from
//! environment variables and TOML files. The coordination policy constants
//! (lease TTL, coverage horizon, pruning grace, admission lead) live here
//! rather than being hard-coded at their use sites.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared store configuration
    pub store: StoreConfig,

    /// Coordination policy
    pub coordination: CoordinationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Shared store (PostgreSQL) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum pool size
    pub pool_size: usize,
}

/// Coordination policy constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Lease time-to-live in seconds; a holder older than this is treated
    /// as expired and its key becomes acquirable by anyone
    pub lease_ttl_secs: u64,

    /// Coverage horizon in days (how far ahead listings should exist)
    pub coverage_horizon_days: u32,

    /// Showtimes older than this many hours are pruned on merge
    pub prune_grace_hours: u64,

    /// Incoming showtimes starting sooner than this many hours from now
    /// are not admitted
    pub admission_lead_hours: u64,

    /// Background paths skip keys refreshed within this many hours
    pub min_refresh_interval_hours: u64,

    /// Total number of shard workers covering the catalog
    pub total_shards: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: 600,
            coverage_horizon_days: 14,
            prune_grace_hours: 24,
            admission_lead_hours: 1,
            min_refresh_interval_hours: 24,
            total_shards: 20,
        }
    }
}

impl CoordinationConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::seconds(self.lease_ttl_secs as i64)
    }

    pub fn prune_grace(&self) -> Duration {
        Duration::hours(self.prune_grace_hours as i64)
    }

    pub fn admission_lead(&self) -> Duration {
        Duration::hours(self.admission_lead_hours as i64)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::hours(self.min_refresh_interval_hours as i64)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("MARQUEE_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| String::from("postgresql://localhost/marquee"));

        let pool_size = std::env::var("MARQUEE_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);

        let lease_ttl_secs = std::env::var("MARQUEE_LEASE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let coverage_horizon_days = std::env::var("MARQUEE_COVERAGE_HORIZON_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(14);

        let prune_grace_hours = std::env::var("MARQUEE_PRUNE_GRACE_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(24);

        let admission_lead_hours = std::env::var("MARQUEE_ADMISSION_LEAD_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);

        let min_refresh_interval_hours = std::env::var("MARQUEE_MIN_REFRESH_INTERVAL_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(24);

        let total_shards = std::env::var("MARQUEE_TOTAL_SHARDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(20);

        let log_level = std::env::var("MARQUEE_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format =
            std::env::var("MARQUEE_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            store: StoreConfig {
                database_url,
                pool_size,
            },
            coordination: CoordinationConfig {
                lease_ttl_secs,
                coverage_horizon_days,
                prune_grace_hours,
                admission_lead_hours,
                min_refresh_interval_hours,
                total_shards,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.store.pool_size == 0 {
            anyhow::bail!("pool_size must be greater than 0");
        }

        if self.coordination.lease_ttl_secs == 0 {
            anyhow::bail!("lease_ttl_secs must be greater than 0");
        }

        if self.coordination.coverage_horizon_days == 0 {
            anyhow::bail!("coverage_horizon_days must be greater than 0");
        }

        if self.coordination.total_shards == 0 {
            anyhow::bail!("total_shards must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_coordination_defaults() {
        let config = CoordinationConfig::default();
        assert_eq!(config.lease_ttl(), Duration::seconds(600));
        assert_eq!(config.prune_grace(), Duration::hours(24));
        assert_eq!(config.admission_lead(), Duration::hours(1));
        assert_eq!(config.coverage_horizon_days, 14);
        assert_eq!(config.total_shards, 20);
    }

    #[test]
    fn test_validate_rejects_zero_shards() {
        let mut config = Config::from_env().unwrap();
        config.coordination.total_shards = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::from_env().unwrap();
        config.coordination.lease_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [store]
            database_url = "postgresql://localhost/marquee_test"
            pool_size = 5

            [coordination]
            lease_ttl_secs = 300
            coverage_horizon_days = 7
            prune_grace_hours = 12
            admission_lead_hours = 2
            min_refresh_interval_hours = 6
            total_shards = 4

            [logging]
            level = "debug"
            format = "json"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.pool_size, 5);
        assert_eq!(config.coordination.lease_ttl_secs, 300);
        assert_eq!(config.coordination.total_shards, 4);
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }
}
