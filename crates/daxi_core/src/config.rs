//! Workspace configuration.
//!
//! # Responsibility
//! - Resolve where projects, the mirror file, the bookmark and logs live.
//! - Apply `DAXI_*` environment overrides on top of defaults.
//!
//! # Invariants
//! - Blank environment values are ignored, never treated as empty paths.
//! - Malformed numeric or enum overrides are rejected, not defaulted.

use crate::logging::default_log_level;
use crate::mirror::{MirrorOrder, MIRROR_FILE_NAME};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const PROJECTS_DIR_ENV: &str = "DAXI_PROJECTS_DIR";
pub const MIRROR_PATH_ENV: &str = "DAXI_MIRROR_PATH";
pub const BOOKMARK_PATH_ENV: &str = "DAXI_BOOKMARK_PATH";
pub const LOG_DIR_ENV: &str = "DAXI_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "DAXI_LOG_LEVEL";
pub const ASSISTANT_TIMEOUT_ENV: &str = "DAXI_ASSISTANT_TIMEOUT_SECS";
pub const MIRROR_ORDER_ENV: &str = "DAXI_MIRROR_ORDER";

const DEFAULT_PROJECTS_DIR: &str = "projects";
const DEFAULT_BOOKMARK_FILE: &str = ".daxi_bookmark";
const DEFAULT_LOG_DIR_NAME: &str = "daxi-logs";
const DEFAULT_ASSISTANT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is unset or blank.
    Missing(&'static str),
    Invalid { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::Invalid { key, message } => write!(f, "invalid setting `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub projects_dir: PathBuf,
    pub mirror_path: PathBuf,
    pub bookmark_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub assistant_timeout: Duration,
    pub mirror_order: MirrorOrder,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from(DEFAULT_PROJECTS_DIR),
            mirror_path: PathBuf::from(MIRROR_FILE_NAME),
            bookmark_path: PathBuf::from(DEFAULT_BOOKMARK_FILE),
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
            log_level: default_log_level().to_string(),
            assistant_timeout: DEFAULT_ASSISTANT_TIMEOUT,
            mirror_order: MirrorOrder::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();
        if let Some(dir) = value(PROJECTS_DIR_ENV) {
            config.projects_dir = PathBuf::from(dir);
        }
        if let Some(path) = value(MIRROR_PATH_ENV) {
            config.mirror_path = PathBuf::from(path);
        }
        if let Some(path) = value(BOOKMARK_PATH_ENV) {
            config.bookmark_path = PathBuf::from(path);
        }
        if let Some(dir) = value(LOG_DIR_ENV) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(level) = value(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        if let Some(raw) = value(ASSISTANT_TIMEOUT_ENV) {
            let secs = raw.parse::<u64>().map_err(|err| ConfigError::Invalid {
                key: ASSISTANT_TIMEOUT_ENV,
                message: format!("`{raw}`: {err}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: ASSISTANT_TIMEOUT_ENV,
                    message: "timeout must be at least one second".to_string(),
                });
            }
            config.assistant_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = value(MIRROR_ORDER_ENV) {
            config.mirror_order = raw.parse().map_err(|message| ConfigError::Invalid {
                key: MIRROR_ORDER_ENV,
                message,
            })?;
        }
        Ok(config)
    }
}
