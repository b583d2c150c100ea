//! Typed settings for the Folio numbering service.
//!
//! Values come from an optional TOML file layered under `FOLIO__*` environment
//! variables, e.g. `FOLIO__STORE__PATH=/var/lib/folio/counters.db`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use folio_sequence::RetryPolicy;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "FOLIO";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FolioConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AllocatorConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Optional file that receives a copy of every log line.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/folio.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".into()
}

impl FolioConfig {
    /// Load settings from `path` (if given) and the `FOLIO__*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`FolioConfig::load`] with a custom environment prefix.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder
            .build()
            .context("failed to assemble configuration sources")?;
        let config: FolioConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse settings from an in-memory TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: FolioConfig = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .context("failed to parse configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.allocator.max_attempts == 0 {
            bail!("allocator.max_attempts must be at least 1");
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            bail!("store.path must be set for the sqlite backend");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.allocator.max_attempts,
            Duration::from_millis(self.allocator.backoff_step_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = FolioConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("data/folio.db"));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config = FolioConfig::from_toml_str(
            r#"
            [store]
            backend = "memory"

            [allocator]
            backoff_step_ms = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.allocator.max_attempts, 3);
        assert_eq!(
            config.retry_policy().backoff_step,
            Duration::from_millis(25)
        );
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = FolioConfig::from_toml_str("[allocator]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        let file = FolioConfig {
            store: StoreConfig {
                path: PathBuf::from("from-file.db"),
                ..StoreConfig::default()
            },
            ..FolioConfig::default()
        };
        std::fs::write(&path, toml::to_string(&file).unwrap()).unwrap();

        std::env::set_var("FOLIO_CFG_TEST__ALLOCATOR__MAX_ATTEMPTS", "5");
        let config = FolioConfig::load_with_prefix(Some(&path), "FOLIO_CFG_TEST").unwrap();
        std::env::remove_var("FOLIO_CFG_TEST__ALLOCATOR__MAX_ATTEMPTS");

        assert_eq!(config.store.path, PathBuf::from("from-file.db"));
        assert_eq!(config.allocator.max_attempts, 5);
    }

    #[test]
    fn example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/folio.example.toml");
        let config = FolioConfig::load_with_prefix(Some(&path), "FOLIO_EXAMPLE_TEST").unwrap();
        assert_eq!(config, FolioConfig::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = FolioConfig::load_with_prefix(
            Some(Path::new("/nonexistent/folio.toml")),
            "FOLIO_MISSING_TEST",
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
