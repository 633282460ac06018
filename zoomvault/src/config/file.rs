//! Loading configuration files.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::parser::parse_ini;
use super::settings::PipelineConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The text is not valid INI.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A key holds a value outside its accepted range or format.
    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl PipelineConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        parse_ini(&ini)
    }
}

/// Path to the default config file (`<config dir>/zoomvault/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zoomvault")
        .join("config.ini")
}
