//! TOML-based configuration for dbscript-guard.
//!
//! The watched folder and the enablement flags are read once at load time;
//! nothing here is mutated while validations run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Folder migration scripts live under when the config does not override it.
pub const DEFAULT_WATCHED_FOLDER: &str = "packaging/dbscripts/upgrade";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Collision check settings.
    #[serde(default)]
    pub guard: GuardSection,

    /// Where project repositories live.
    #[serde(default)]
    pub repositories: RepositoriesConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-project overrides, keyed by project id.
    #[serde(default)]
    pub projects: HashMap<String, ProjectConfig>,
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Collision check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSection {
    /// Whether the check runs for projects without an explicit override.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Repository-relative folder holding migration scripts.
    #[serde(default = "default_watched_folder")]
    pub watched_folder: String,
}

fn default_true() -> bool {
    true
}
fn default_watched_folder() -> String {
    DEFAULT_WATCHED_FOLDER.into()
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            enabled: true,
            watched_folder: default_watched_folder(),
        }
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Repository location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// Directory containing one repository per project (`<id>.git` or
    /// `<id>`). When unset, a project id is treated as a path.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Per-project override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Overrides `guard.enabled` for this project.
    #[serde(default)]
    pub enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl GuardConfig {
    /// Load a [`GuardConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse a config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate values and normalize the watched folder (trailing `/`
    /// trimmed).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let folder = self.guard.watched_folder.trim().trim_end_matches('/');

        if folder.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "guard.watched_folder".into(),
                detail: "watched folder must not be empty".into(),
            });
        }
        if folder.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "guard.watched_folder".into(),
                detail: "watched folder must be relative to the repository root".into(),
            });
        }
        if folder.split('/').any(|c| c == ".." || c == "." || c.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "guard.watched_folder".into(),
                detail: format!("'{}' is not a normalized repository path", folder),
            });
        }
        self.guard.watched_folder = folder.to_string();

        let level = self.logging.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.log_level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.logging.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the collision check runs for `project`.
    pub fn is_enabled_for(&self, project: &str) -> bool {
        self.projects
            .get(project)
            .and_then(|p| p.enabled)
            .unwrap_or(self.guard.enabled)
    }
}
