//! Daemon configuration.
//!
//! The configuration is read from a JSON file, by default
//! `$XDG_CONFIG_HOME/workspaced/config.json`.  Every section is optional and
//! unknown keys are ignored, so `{}` is a valid file.
//!
//! # Example
//!
//! ```json
//! {
//!   "workspaces": {
//!     "names": ["main", "web", "chat"],
//!     "popup_time_ms": 1000
//!   },
//!   "ipc": { "max_recv_buf": 65536 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspaces: WorkspaceConfig,

    #[serde(default)]
    pub ipc: IpcConfig,
}

/// Declared workspaces and indicator timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace names applied on reconfigure when nothing is persisted.
    pub names: Vec<String>,
    /// How long the indicator stays up after a switch (ms).  `0` disables
    /// the indicator.
    pub popup_time_ms: u64,
}

impl WorkspaceConfig {
    pub fn popup_time(&self) -> Duration {
        Duration::from_millis(self.popup_time_ms)
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            names: vec!["1".to_string(), "2".to_string()],
            popup_time_ms: 1000,
        }
    }
}

/// IPC socket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Per-connection receive buffer ceiling in bytes.  A client that sends
    /// more than this without a newline is disconnected.
    pub max_recv_buf: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_recv_buf: 64 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Load from `path` if given, falling back to the defaults on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load(p).unwrap_or_else(|e| {
                log::warn!("{}, using defaults", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

/// Default config file location: `$XDG_CONFIG_HOME/workspaced/config.json`,
/// falling back to `$HOME/.config/workspaced/config.json`.
pub fn default_path() -> Option<PathBuf> {
    resolve_path(
        std::env::var("XDG_CONFIG_HOME").ok(),
        std::env::var("HOME").ok(),
    )
}

fn resolve_path(xdg_config_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    let base = match xdg_config_home.filter(|s| !s.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(home.filter(|h| !h.is_empty())?).join(".config"),
    };
    Some(base.join("workspaced").join("config.json"))
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
