//! Bridge configuration (`config.toml`).
//!
//! Looked up in order: `--config`, `~/.config/pipewire-homeassistant/config.toml`,
//! then `./config/config.toml`. Every section and key is optional on disk;
//! the Home Assistant URL and token are checked separately by `validate`.

use pw_monitor::monitor::{DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_PRODUCER_ARGS, DEFAULT_PRODUCER_COMMAND};
use pw_monitor::MonitorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "pipewire-homeassistant";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_DIR: &str = "config";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config.toml not found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub homeassistant: HomeAssistantSettings,
    pub monitor: MonitorSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HomeAssistantSettings {
    pub url: String,
    pub token: String,
    /// Defaults to the host name.
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub command: String,
    pub args: Vec<String>,
    pub join_timeout_ms: u64,
    pub max_snapshot_bytes: Option<usize>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_PRODUCER_COMMAND.to_string(),
            args: DEFAULT_PRODUCER_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            max_snapshot_bytes: None,
        }
    }
}

impl MonitorSettings {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            max_snapshot_bytes: self.max_snapshot_bytes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
}

impl BridgeConfig {
    /// Checks the fields needed to talk to Home Assistant.
    pub fn validate(&self, require_homeassistant: bool) -> Result<(), ConfigError> {
        if self.monitor.command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "monitor.command must not be empty".to_string(),
            ));
        }
        if !require_homeassistant {
            return Ok(());
        }
        if self.homeassistant.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "homeassistant.url is required".to_string(),
            ));
        }
        if self.homeassistant.token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "homeassistant.token is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default search locations, most specific first.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME));
    paths
}

pub fn discover_config_path(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::NotFound {
            searched: vec![path.to_path_buf()],
        });
    }

    candidates
        .iter()
        .find(|path| path.exists())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}

pub fn load_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = fs_err::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<BridgeConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load(explicit: Option<&Path>) -> Result<(PathBuf, BridgeConfig), ConfigError> {
    let path = discover_config_path(explicit, &candidate_paths())?;
    let config = load_from(&path)?;
    Ok((path, config))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
