//! Runtime configuration.
//!
//! Settings are layered from YAML files and environment variables and then
//! turned into the [`LedgerSettings`] the service consumes.

use std::collections::BTreeMap;
use std::time::Duration;

use ::config::{Config as ConfigLib, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::application::{LedgerSettings, DEFAULT_BONUS_CENTS};
use crate::domain::{Catalog, CatalogError, Cents};
use crate::storage::StoreOptions;

/// Default configuration file name (looked up as `shopledger.yaml`).
pub const DEFAULT_CONFIG_FILE: &str = "shopledger";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SHOPLEDGER_CONFIG";
/// Prefix for configuration environment variables, e.g. `SHOPLEDGER__BONUS_CENTS`.
pub const CONFIG_ENV_PREFIX: &str = "SHOPLEDGER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SHOPLEDGER_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file path.
    pub database: String,
    /// First-time bonus, in cents.
    pub bonus_cents: Cents,
    /// How long a writer waits on the database lock.
    pub busy_timeout_ms: u64,
    /// How long a caller waits for a pooled connection.
    pub acquire_timeout_ms: u64,
    pub max_connections: u32,
    /// Item id -> price in cents. Replaces the built-in catalog when set.
    pub catalog: Option<BTreeMap<String, Cents>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: "shopledger.db".to_string(),
            bonus_cents: DEFAULT_BONUS_CENTS,
            busy_timeout_ms: 5_000,
            acquire_timeout_ms: 10_000,
            max_connections: 8,
            catalog: None,
        }
    }
}

impl Settings {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `shopledger.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok();
        Self::build(
            path,
            env_path.as_deref(),
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    fn build(
        path: Option<&str>,
        env_path: Option<&str>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }
        if let Some(config_path) = env_path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate and convert into service settings.
    pub fn ledger_settings(&self) -> Result<LedgerSettings, ConfigError> {
        if self.bonus_cents <= 0 {
            return Err(ConfigError::Invalid {
                name: "bonus_cents",
                reason: format!("must be positive, got {}", self.bonus_cents),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "max_connections",
                reason: "must be at least 1".to_string(),
            });
        }

        let catalog = match &self.catalog {
            Some(items) => Catalog::new(items.clone())?,
            None => Catalog::default(),
        };

        Ok(LedgerSettings {
            bonus_cents: self.bonus_cents,
            catalog,
            store: StoreOptions {
                busy_timeout: Duration::from_millis(self.busy_timeout_ms),
                acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
                max_connections: self.max_connections,
                create_if_missing: false,
            },
        })
    }
}
