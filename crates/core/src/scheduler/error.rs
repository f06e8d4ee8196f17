//! Error types for scheduler command construction and output parsing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Submission output did not have the shape the backend promises.
    #[error("Could not extract a {scheduler} job id from: {line}")]
    JobIdParse {
        scheduler: &'static str,
        line: String,
    },

    /// The backend has no implementation for this operation.
    #[error("{scheduler} does not support {operation}")]
    Unsupported {
        scheduler: &'static str,
        operation: &'static str,
    },

    /// The backend tails a monitor file but none was configured.
    #[error("{0} needs a monitor file to observe job completion, but none was set")]
    MissingMonitorFile(&'static str),

    #[error("A wait condition needs at least one job id")]
    EmptyWaitCondition,

    #[error("Unknown scheduler '{0}', expected one of LSF, PBS, OGE")]
    UnknownScheduler(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
