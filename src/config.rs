//! Application configuration and logging setup
//!
//! Configuration is layered (highest priority last):
//! 1. Built-in defaults
//! 2. TOML config file (if given)
//! 3. Environment variables prefixed with `EXP_RUNNER_` (`EXP_RUNNER_LOGGING__LEVEL=debug`)
//! 4. Explicit overrides merged by the caller (CLI flags)

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "EXP_RUNNER_";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `exp_runner=debug`, ...).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Build the filter, letting `RUST_LOG` take precedence over `level`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `level` is not a valid filter directive.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::Config(format!("invalid log level '{}': {e}", self.level)))
    }

    /// Install a subscriber for the current thread.
    ///
    /// The subscriber stays active until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `level` is not a valid filter directive.
    pub fn install(&self) -> Result<DefaultGuard> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_writer(std::io::stderr)
            .with_target(false);

        let guard = match self.format {
            LogFormat::Pretty => tracing::subscriber::set_default(builder.pretty().finish()),
            LogFormat::Compact => tracing::subscriber::set_default(builder.compact().finish()),
            LogFormat::Json => tracing::subscriber::set_default(builder.json().finish()),
        };
        Ok(guard)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Experiment runs are grouped under.
    pub experiment_name: String,
    /// Local tracking directory; runs are kept in memory only when unset.
    pub tracking_dir: Option<PathBuf>,
    /// Whether runs are logged at all.
    pub log_experiment: bool,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            experiment_name: "default".to_string(),
            tracking_dir: Some(PathBuf::from("mlruns")),
            log_experiment: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layered configuration sources without caller overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `path` is given but does not exist.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source is missing or malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// Extract configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the merged sources do not form a valid config.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}
