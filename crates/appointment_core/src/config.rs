//! Store and logging configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how the storage collaborator behaves.
//! - Load that description from TOML text, a TOML file, or the environment.
//!
//! # Invariants
//! - A missing `database_path` means an in-memory store.
//! - `busy_timeout_ms` is never zero after validation.
//! - `log_dir`, when set, is absolute.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "APPOINTMENT_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "APPOINTMENT_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "APPOINTMENT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "APPOINTMENT_LOG_DIR";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Settings for opening the appointment store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file path. `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Log level for `init_logging`; falls back to the build default.
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// File-backed store at `path` with default settings.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Builds a config from `APPOINTMENT_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_BUSY_TIMEOUT_MS} must be an integer, got `{raw}`"))
            })?;
        }
        config.log_level = non_blank(lookup(ENV_LOG_LEVEL));
        config.log_dir = non_blank(lookup(ENV_LOG_DIR)).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = self.log_dir.as_deref() {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
