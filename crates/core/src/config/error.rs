//! Error types for configuration loading.

use crate::locality::ExecutionError;
use crate::scheduler::SchedulerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML file at {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse YAML file at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to traverse directory {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Parsed, but the contents make no sense.
    #[error("Invalid configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("Invalid scheduler settings: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid locality settings: {0}")]
    Locality(#[from] ExecutionError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
