//! Configuration for querysh.
//!
//! This module provides TOML configuration file loading, by default from
//! `~/.querysh/config.toml`, or from the path given with `--config-file`.
//!
//! # Configuration File
//!
//! ```toml
//! prompt = "querysh> "
//!
//! # Line editing keymap: emacs or vi
//! edit_mode = "emacs"
//!
//! [history]
//! limit = 0           # 0 keeps every line
//!
//! [status_bar]
//! visible = true
//! fg = { r = 255, g = 255, b = 255 }
//! bg = { r = 0, g = 100, b = 0 }
//!
//! [log]
//! level = "info"
//! file = "/tmp/querysh.log"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prompt shown by the line editor
    pub prompt: String,
    /// Keymap for line editing
    pub edit_mode: EditMode,
    pub history: HistoryConfig,
    pub status_bar: StatusBarConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "querysh> ".to_string(),
            edit_mode: EditMode::Emacs,
            history: HistoryConfig::default(),
            status_bar: StatusBarConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    Emacs,
    Vi,
}

/// History configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Oldest lines are dropped beyond this count (0 = keep all)
    pub limit: usize,
}

/// Status bar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
    pub fg: Color,
    pub bg: Color,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self {
            visible: true,
            fg: Color::new(255, 255, 255),
            bg: Color::new(0, 100, 0),
        }
    }
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    /// Log file; `~/.querysh/querysh.log` when unset
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load the default configuration file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("{}; using defaults", e),
                }
            }
        }
        Self::default()
    }

    /// Load a specific configuration file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.querysh/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Where log output goes
    pub fn log_path(&self) -> PathBuf {
        self.log
            .file
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("querysh.log")))
            .unwrap_or_else(|| PathBuf::from("querysh.log"))
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

// ~/.querysh
fn data_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".querysh"))
}
