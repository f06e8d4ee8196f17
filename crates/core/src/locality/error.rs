//! Error types for command execution.

use crate::monitor::MonitorError;
use crate::param::ParamError;
use crate::scheduler::SchedulerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to launch '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    /// The scheduler refused the job.
    #[error("Job submission failed with exit code {exit_code}: {}", output.join("\n"))]
    Submission { exit_code: i32, output: Vec<String> },

    #[error("{0} locality is not supported")]
    UnsupportedLocality(String),

    #[error("Unknown locality '{0}', expected LOCAL or REMOTE")]
    UnknownLocality(String),

    #[error("Background execution requires a scheduler")]
    BackgroundWithoutScheduler,

    #[error("Running {0} requires a scheduler")]
    SchedulerRequired(&'static str),

    #[error("Execution was aborted")]
    Aborted,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Param(#[from] ParamError),
}
