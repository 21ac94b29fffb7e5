//! TOML-based configuration for graft.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::models::ReplayMode;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraftConfig {
    /// Backend settings.
    #[serde(default)]
    pub git: GitConfig,

    /// Transplant behaviour.
    #[serde(default)]
    pub transplant: TransplantConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// Backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git binary.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Comment character used in rebase TODO files.
    #[serde(default = "default_comment_char")]
    pub comment_char: char,
}

fn default_binary() -> String {
    "git".into()
}
fn default_comment_char() -> char {
    '#'
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            comment_char: default_comment_char(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transplant
// ---------------------------------------------------------------------------

/// What to do when a transplant starts from a dirty worktree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutostashPolicy {
    /// Ask before stashing.
    #[default]
    Prompt,
    /// Stash without asking.
    Always,
}

/// Transplant behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransplantConfig {
    /// Ask "are you sure" before pasting copied commits.
    #[serde(default = "default_true")]
    pub confirm_before_paste: bool,

    #[serde(default)]
    pub autostash: AutostashPolicy,

    /// Message for the stash entry created before a transplant.
    #[serde(default = "default_stash_label")]
    pub stash_label: String,

    /// Stage a textual conflict as soon as its last hunk is resolved.
    #[serde(default)]
    pub auto_stage_resolved: bool,

    #[serde(default)]
    pub default_mode: ReplayMode,
}

fn default_true() -> bool {
    true
}
fn default_stash_label() -> String {
    "Stash all changes".into()
}

impl Default for TransplantConfig {
    fn default() -> Self {
        Self {
            confirm_before_paste: true,
            autostash: AutostashPolicy::default(),
            stash_label: default_stash_label(),
            auto_stage_resolved: false,
            default_mode: ReplayMode::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl GraftConfig {
    /// Default location: `<config dir>/graft/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("graft").join("config.toml"))
    }

    /// Load a [`GraftConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: GraftConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(ConfigError::FileNotFound(p)) => {
                debug!(path = %p, "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.binary".into(),
                detail: "git binary must not be empty".into(),
            });
        }
        if self.git.comment_char.is_whitespace() {
            return Err(ConfigError::InvalidValue {
                field: "git.comment_char".into(),
                detail: "comment character must not be whitespace".into(),
            });
        }
        if self.transplant.stash_label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transplant.stash_label".into(),
                detail: "stash label must not be empty".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log.level".into(),
                detail: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
        Ok(())
    }

    /// Serialize back to TOML, e.g. for `graft init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
