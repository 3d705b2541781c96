use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::poller::PollPolicy;

/// Where and how the recent-weather query runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub database: String,
    pub table: String,

    /// Prefix the query service writes its own result artifacts under.
    pub output_location: String,

    pub row_limit: u32,
    pub poll_interval_secs: u64,

    /// Unset means no cap on the number of state checks.
    pub max_poll_attempts: Option<u32>,

    /// Deadline for the whole wait. `0` or unset means no deadline; a file that
    /// omits the key gets the default.
    pub poll_timeout_secs: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            database: "weather_data_db".to_string(),
            table: "forecast_data".to_string(),
            output_location: "s3://weather-etl-project/athena-query-results/".to_string(),
            row_limit: 7,
            poll_interval_secs: 2,
            max_poll_attempts: None,
            poll_timeout_secs: Some(300),
        }
    }
}

impl QueryConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
            timeout: self
                .poll_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

/// Bucket layout shared by the transformer and the query table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub raw_prefix: String,
    pub processed_prefix: String,
    pub forecast_prefix: String,
    pub wind_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "weather-etl-project".to_string(),
            raw_prefix: "raw_data/to_process/".to_string(),
            processed_prefix: "raw_data/processed/".to_string(),
            forecast_prefix: "transformed_data/forecast_data/".to_string(),
            wind_prefix: "transformed_data/wind_data/".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [query]
/// database = "weather_data_db"
/// poll_timeout_secs = 120
///
/// [storage]
/// bucket = "weather-etl-project"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub query: QueryConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from `path`, or built-in defaults if there is no file yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-etl", "weather-etl")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.poll_interval_secs == 0 {
            return Err(anyhow!("query.poll_interval_secs must be at least 1"));
        }
        if self.query.max_poll_attempts == Some(0) {
            return Err(anyhow!("query.max_poll_attempts must be at least 1"));
        }
        if self.query.row_limit == 0 {
            return Err(anyhow!("query.row_limit must be at least 1"));
        }
        if self.storage.raw_prefix == self.storage.processed_prefix {
            return Err(anyhow!(
                "storage.raw_prefix and storage.processed_prefix must differ"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_resources() {
        let cfg = Config::default();

        assert_eq!(cfg.query.database, "weather_data_db");
        assert_eq!(cfg.query.table, "forecast_data");
        assert_eq!(cfg.storage.bucket, "weather-etl-project");
        assert_eq!(cfg.storage.raw_prefix, "raw_data/to_process/");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[query]\ntable = \"daily\"\nmax_poll_attempts = 10\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(cfg.query.table, "daily");
        assert_eq!(cfg.query.database, "weather_data_db");
        assert_eq!(cfg.query.max_poll_attempts, Some(10));
        assert_eq!(cfg.storage, StorageConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.storage.bucket = "other-bucket".into();
        cfg.query.poll_timeout_secs = Some(60);
        cfg.query.max_poll_attempts = Some(20);
        cfg.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[query]\npoll_interval_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("poll_interval_secs"));
    }

    #[test]
    fn rejects_zero_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[query]\nmax_poll_attempts = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_poll_attempts"));
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[query]\npoll_timeout_secs = 0\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(cfg.query.poll_timeout_secs, Some(0));
        assert_eq!(cfg.query.poll_policy().timeout, None);
    }

    #[test]
    fn poll_policy_from_config() {
        let policy = QueryConfig::default().poll_policy();

        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.timeout, Some(Duration::from_secs(300)));
    }
}
