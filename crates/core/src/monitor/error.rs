//! Error types for job completion monitoring.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// The monitored file vanished after it had been seen. The exit code is
    /// unknowable.
    #[error("Monitor target {path} disappeared before the job completed")]
    ExternalDeletion { path: PathBuf },

    /// A banner line looked like a known marker but could not be parsed.
    #[error("Unrecognised scheduler output: {0}")]
    BannerParse(String),

    #[error("Timed out after {0:?} waiting for job completion")]
    Timeout(Duration),

    #[error("Monitoring was cancelled before the job completed")]
    Cancelled,

    #[error("Failed to read monitor target {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type MonitorResult<T> = Result<T, MonitorError>;
