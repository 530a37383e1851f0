//! Type-safe configuration loader using the `config` crate,
//! with manual environment-variable overrides for every setting.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File};
use serde::Deserialize;
use std::{env, path::PathBuf};

/// Upstream SQL dump of the administrative divisions.
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/cahyadsn/wilayah/raw/master/db/wilayah.sql";

/// Maximum number of in-flight JSON writes per batch.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 32;

/// Settings shared by the update and export pipelines.
///
/// Every field has a built-in default, so running without a `Config.toml`
/// reproduces the fixed `./data` and `./static/api` layout.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Where the SQL dump is downloaded from
    pub source_url: String,

    /// Scratch store the dump is executed into (e.g. "sqlite::memory:")
    pub database_url: String,

    /// Directory holding the four `;`-delimited flat files
    pub data_dir: PathBuf,

    /// Root of the generated static JSON tree
    pub api_dir: PathBuf,

    /// Batch bound for the JSON fan-out writer
    pub write_concurrency: usize,

    /// Optional Prometheus textfile written at the end of a run
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the built-in defaults, then `Config.toml` (if present),
    /// then apply any overrides from these environment variables:
    ///
    /// - `APP__SOURCE_URL`
    /// - `APP__DATABASE_URL`
    /// - `APP__DATA_DIR`
    /// - `APP__API_DIR`
    /// - `APP__WRITE_CONCURRENCY`
    /// - `APP__METRICS_PATH`
    pub fn new() -> Result<Self, ConfigError> {
        let cfg = Self::defaults()?
            .add_source(File::with_name("Config").required(false))
            .build()?;

        Self::from_config(cfg)
    }

    /// Builder pre-seeded with the default layout.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("source_url", DEFAULT_SOURCE_URL)?
            .set_default("database_url", "sqlite::memory:")?
            .set_default("data_dir", "./data")?
            .set_default("api_dir", "./static/api")?
            .set_default("write_concurrency", DEFAULT_WRITE_CONCURRENCY as i64)
    }

    /// Deserialize an already-built `Config`, apply the `APP__*` overrides,
    /// then check the result. Validation runs once, after the overrides.
    pub fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = cfg.try_deserialize()?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = env::var("APP__SOURCE_URL") {
            self.source_url = val;
        }
        if let Ok(val) = env::var("APP__DATABASE_URL") {
            self.database_url = val;
        }
        if let Ok(val) = env::var("APP__DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("APP__API_DIR") {
            self.api_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("APP__WRITE_CONCURRENCY") {
            self.write_concurrency = val
                .parse()
                .map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        }
        if let Ok(val) = env::var("APP__METRICS_PATH") {
            self.metrics_path = Some(PathBuf::from(val));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.write_concurrency == 0 {
            return Err(ConfigError::Message(
                "`write_concurrency` must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
