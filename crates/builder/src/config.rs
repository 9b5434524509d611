// Local configuration for the builder core.
//
// Global config: `~/.tabula/config.toml`. Hosts may also construct a
// `BuilderConfig` directly and skip the file entirely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tabula_common::types::GridLayout;

use crate::autosave::AutoSavePolicy;
use crate::history::DEFAULT_MAX_HISTORY_STEPS;
use crate::placement::DEFAULT_MAX_SCAN_ROWS;

/// Root directory for Tabula global state: `~/.tabula/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tabula"))
}

/// Path to the global config file: `~/.tabula/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Builder configuration at `~/.tabula/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuilderConfig {
    pub autosave: AutoSaveConfig,
    pub history: HistoryConfig,
    pub grid: GridConfig,
}

impl BuilderConfig {
    /// Load from `~/.tabula/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.tabula/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Auto-save scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Quiet period after the last mutation, in milliseconds.
    pub debounce_ms: u64,
    /// Delay between arming and the save attempt, in milliseconds.
    pub interval_ms: u64,
    pub max_retries: u32,
    /// Base delay for the linear retry backoff, in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 1_000,
            interval_ms: 30_000,
            max_retries: 3,
            retry_base_ms: 2_000,
        }
    }
}

impl AutoSaveConfig {
    pub fn policy(&self) -> AutoSavePolicy {
        AutoSavePolicy {
            enabled: self.enabled,
            debounce: Duration::from_millis(self.debounce_ms),
            interval: Duration::from_millis(self.interval_ms),
            max_retries: self.max_retries,
            retry_base: Duration::from_millis(self.retry_base_ms),
        }
    }
}

/// Undo/redo history settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_steps: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_steps: DEFAULT_MAX_HISTORY_STEPS }
    }
}

/// Grid defaults for new dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub columns: u32,
    pub row_height_px: u32,
    pub margin_px: u32,
    /// Scan depth for first-fit placement.
    pub max_scan_rows: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        let layout = GridLayout::default();
        Self {
            columns: layout.columns,
            row_height_px: layout.row_height_px,
            margin_px: layout.margin_px,
            max_scan_rows: DEFAULT_MAX_SCAN_ROWS,
        }
    }
}

impl GridConfig {
    pub fn layout(&self) -> GridLayout {
        GridLayout {
            columns: self.columns.max(1),
            row_height_px: self.row_height_px,
            margin_px: self.margin_px,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
