//! Bootstrap configuration loading and data folder resolution
//!
//! Configuration file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `GROUPSIGHT_CONFIG` environment variable
//! 3. User config file (`~/.config/groupsight/config.toml` on Linux)
//! 4. System config file (`/etc/groupsight/config.toml`, Linux only)
//! 5. Built-in defaults
//!
//! A missing configuration file is never fatal: defaults are used and a
//! warning is logged. A file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "GROUPSIGHT_CONFIG";

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV_VAR: &str = "GROUPSIGHT_DATA_FOLDER";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "groupsight.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            oracle: OracleConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Text-evaluation oracle connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Chat-completions endpoint URL; oracle disabled when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Lowest-priority source for the API key (database and environment win)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_oracle_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_oracle_model(),
            api_key: None,
            timeout_secs: default_oracle_timeout_secs(),
            requests_per_second: default_oracle_requests_per_second(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Start-recording broadcast timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: default_retry_interval_secs(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl BroadcastConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_oracle_requests_per_second() -> u32 {
    2
}

fn default_retry_interval_secs() -> u64 {
    4
}

fn default_deadline_secs() -> u64 {
    30
}

/// Locate the configuration file, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("groupsight").join("config.toml")) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Priority 4: System config (Linux only)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/groupsight/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load TOML configuration, falling back to defaults when the file is absent
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No configuration file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Configuration file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the data folder
///
/// Priority: CLI → `GROUPSIGHT_DATA_FOLDER` → TOML → OS default
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/groupsight (or /var/lib/groupsight for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("groupsight"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/groupsight"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("groupsight"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/groupsight"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("groupsight"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\groupsight"))
    } else {
        PathBuf::from("./groupsight_data")
    }
}

/// Database path inside a data folder
pub fn database_path(data_folder: &Path) -> PathBuf {
    data_folder.join(DATABASE_FILE_NAME)
}
