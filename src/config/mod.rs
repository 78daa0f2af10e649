//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod scheduler;
mod storage;

pub use scheduler::SchedulerConfig;
pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ROLLUP_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ROLLUP";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ROLLUP_LOG";
/// Environment variable for database URL (overrides the storage section).
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

use serde::Deserialize;

use crate::error::EngineError;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `ROLLUP_CONFIG` environment variable (if set)
    /// 4. Environment variables with `ROLLUP__` prefix
    pub fn load(path: Option<&str>) -> Result<Self, EngineError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new("config", FileFormat::Yaml).required(false))
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::FatalConfig(e.to_string()))?;

        let config: Config = config
            .try_deserialize()
            .map_err(|e| EngineError::FatalConfig(e.to_string()))?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.storage.storage_type, StorageType::Sqlite);
    }

    #[test]
    fn test_config_for_test() {
        let config = Config::for_test();
        assert!(config.scheduler.validate().is_ok());
    }
}
