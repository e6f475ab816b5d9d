//! Sync settings loaded from JSON.
//!
//! # Invariants
//! - Loaded settings are validated before use.
//! - Missing fields take their defaults.

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

/// Errors from loading or validating settings.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read settings {}: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed settings: {err}"),
            Self::Invalid(message) => write!(f, "invalid settings: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for export/import runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Folder holding one subfolder per entity kind.
    pub root_folder: PathBuf,
    /// Document file extension, without the dot.
    pub file_extension: String,
    /// Name files by entity key instead of alias.
    pub use_guid_names: bool,
    pub log: LogConfig,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            root_folder: PathBuf::from("typesync"),
            file_extension: "config".to_string(),
            use_guid_names: false,
            log: LogConfig::default(),
        }
    }
}

impl SyncSettings {
    /// Reads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("root_folder must not be empty".to_string()));
        }
        let extension = self.file_extension.trim();
        if extension.is_empty() || extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "file_extension must be a bare extension, got `{}`",
                self.file_extension
            )));
        }
        self.log.validate().map_err(ConfigError::Invalid)
    }
}
