//! Configuration loading for timebox.
//!
//! The config file lives at `~/.timebox/config.toml` unless `TIMEBOX_CONFIG`
//! points elsewhere. Every section is optional:
//!
//! ```toml
//! [timeouts]
//! test = "2 min"
//! keyword = "${step_limit}"
//! message = "Step exceeded ${step_limit}"
//!
//! [variables]
//! step_limit = "30s"
//!
//! [guard]
//! settle_delay_ms = 1
//! announce = true
//! worker_name = "timebox-worker"
//!
//! [logging]
//! filter = "timebox=debug"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use timebox_core::GuardOptions;

const CONFIG_ENV_VAR: &str = "TIMEBOX_CONFIG";

// Default value functions for serde
const fn default_true() -> bool {
    true
}

const fn default_settle_delay_ms() -> u64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeboxConfig {
    pub timeouts: Option<TimeoutsConfig>,
    pub guard: Option<GuardConfig>,
    pub logging: Option<LoggingConfig>,
    /// Scalars available to `${name}` in timeout and message text.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Default timeout text, templated at run time.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TimeoutsConfig {
    pub test: Option<String>,
    pub keyword: Option<String>,
    /// Failure message for the keyword timeout.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Pause after spawning a worker before waiting on it. Default: 1.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Log the remaining budget at debug level. Default: true.
    #[serde(default = "default_true")]
    pub announce: bool,
    pub worker_name: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            announce: true,
            worker_name: None,
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn options(&self) -> GuardOptions {
        let defaults = GuardOptions::default();
        GuardOptions {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            announce: self.announce,
            worker_name: self
                .worker_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.worker_name),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: Option<String>,
}

impl TimeboxConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file");
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn guard_options(&self) -> GuardOptions {
        self.guard.clone().unwrap_or_default().options()
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|logging| logging.filter.as_deref())
    }
}

/// `$TIMEBOX_CONFIG`, else `~/.timebox/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".timebox").join("config.toml"))
}
