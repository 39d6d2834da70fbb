//! Configuration and settings management
//!
//! Two layers live here: runtime [`Settings`] loaded from config files and the
//! environment, and the persistent [`BotConfig`] JSON file written by the
//! first-run setup.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Results shorter than this many characters are sent inline.
pub const INLINE_RESULT_LIMIT: usize = 4000;

/// Suffix an uploaded document must carry to be accepted.
pub const PYTHON_FILE_SUFFIX: &str = ".py";

/// Initial delay before retrying a Telegram file operation
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the retry delay
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Number of retries for Telegram file operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Errors raised while loading settings or the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Layered settings could not be built or deserialized
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
    /// Reading or writing the configuration file failed
    #[error("IO error on {path}: {source}")]
    Io {
        /// File that caused the error
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Path of the JSON file holding the bot token and admin id
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Python interpreter used to run the obfuscation engine
    #[serde(default = "default_python_bin")]
    pub python_bin: String,

    /// Directory containing the engine module
    #[serde(default = "default_engine_dir")]
    pub engine_dir: PathBuf,

    /// Module that exports `BlankOBFv2`
    #[serde(default = "default_engine_module")]
    pub engine_module: String,

    /// Directory for transient upload and result files
    #[serde(default = "std::env::temp_dir")]
    pub temp_dir: PathBuf,

    /// Ask before reusing an existing configuration file
    #[serde(default)]
    pub ask_reuse_config: bool,

    /// Drop sessions after this many idle seconds; unset keeps them forever
    #[serde(default)]
    pub session_idle_ttl_secs: Option<u64>,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_engine_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_engine_module() -> String {
    "obfcore".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            python_bin: default_python_bin(),
            engine_dir: default_engine_dir(),
            engine_module: default_engine_module(),
            temp_dir: std::env::temp_dir(),
            ask_reuse_config: false,
            session_idle_ttl_secs: None,
        }
    }
}

impl Settings {
    /// Create new settings by loading from files and environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP_PYTHON_BIN=python3.12 ./target/pyobf-bot`
            .add_source(Environment::with_prefix("APP").separator("__"))
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        Ok(s.try_deserialize()?)
    }
}

/// Bot credentials persisted by the first-run setup
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Telegram Bot API token
    #[serde(default)]
    pub token: String,
    /// Telegram id of the administrator
    #[serde(default)]
    pub admin: String,
}

impl BotConfig {
    /// True when no token has been stored yet
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.token.trim().is_empty()
    }
}

/// Flat JSON file holding the [`BotConfig`]
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored configuration, or an empty one if the file is missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<BotConfig, ConfigError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No configuration file yet");
                return Ok(BotConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Overwrite the file with `config` as indented JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, config: &BotConfig) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, data).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
