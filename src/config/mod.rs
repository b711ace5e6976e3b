//! Configuration for the inspector host
//!
//! Settings are stored as TOML in the platform-appropriate data directory:
//! - **Linux**: `~/.local/share/dev.inspector-rs/`
//! - **macOS**: `~/Library/Application Support/dev.inspector-rs/`
//! - **Windows**: `%APPDATA%\dev.inspector-rs\`
//!
//! # Files
//!
//! - `inspector.toml` - This configuration
//! - `node_state.json` - Persisted node visibility (see [`crate::state`])
//!
//! # Example
//!
//! ```toml
//! [update]
//! max_depth = 8
//! multiplier = 4
//!
//! [elements]
//! max_elements = 64
//!
//! [logging]
//! filter = "info,inspector_rs=trace"
//! ```

use crate::error::{InspectError, Result};
use crate::state::STATE_FILE;
use crate::tree::{UpdateOptions, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.inspector-rs";

/// Configuration filename
pub const CONFIG_FILE: &str = "inspector.toml";

/// Get the application data directory
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        InspectError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            InspectError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the default config file path
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_multiplier() -> u32 {
    1
}

fn default_max_elements() -> usize {
    crate::tree::kinds::DEFAULT_MAX_ELEMENTS
}

fn default_filter() -> String {
    "info,inspector_rs=debug".to_string()
}

/// Refresh walk settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Levels below the starting node a walk may visit
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Also refresh collapsed nodes
    #[serde(default)]
    pub deep: bool,

    /// Steps per tick for async refresh
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            deep: false,
            multiplier: default_multiplier(),
        }
    }
}

impl UpdateConfig {
    pub fn options(&self) -> UpdateOptions {
        UpdateOptions::default()
            .with_max_depth(self.max_depth)
            .deep(self.deep)
    }
}

/// List display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementsConfig {
    /// Elements shown per list
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            max_elements: default_max_elements(),
        }
    }
}

/// Node state persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// State file; defaults to `node_state.json` in the app data directory
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Save node state when the host exits
    #[serde(default = "default_true")]
    pub autosave: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            autosave: true,
        }
    }
}

impl PersistenceConfig {
    /// Configured state file, or the default one in the app data directory.
    pub fn resolved_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .clone()
            .or_else(|| app_data_dir().map(|p| p.join(STATE_FILE)))
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Directory for daily rolling log files; no file logging when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            log_dir: None,
        }
    }
}

/// Complete inspector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectorConfig {
    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub elements: ElementsConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InspectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            InspectError::Config("Could not determine config path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        match config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load configuration: {}, using defaults", e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InspectError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        toml::from_str(&content).map_err(|e| {
            InspectError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(CONFIG_FILE))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                InspectError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| InspectError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            InspectError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })?;
        tracing::debug!("Saved configuration to {:?}", path);
        Ok(())
    }
}
