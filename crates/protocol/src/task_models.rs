//! Runtime task state models.
//!
//! A `Task` binds a pipeline to concrete parameter values and tracks its
//! progress through the pipeline. Every attempt to run one of the pipeline's
//! processes is recorded as a `ProcessRun`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle state of a task.
///
/// Pending -> Running -> {Completed, Aborted, Failed}
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Created or submitted but not yet dispatched.
    Pending,

    /// The first process has begun.
    Running,

    /// Every process finished with exit code 0.
    Completed,

    /// Stopped by an operator request.
    Aborted,

    /// A process failed; the pipeline halted at that step.
    Failed,
}

impl TaskState {
    /// Completed, Aborted and Failed are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Aborted | TaskState::Failed
        )
    }
}

/// Scheduling priority requested by the submitter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Record of one attempt to execute a process within a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ProcessRun {
    #[ts(type = "string")]
    pub id: Uuid,

    pub process_name: String,

    pub submitter: String,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    /// -1 until the exit value is known.
    pub exit_value: i32,

    /// Scheduler job id, when the scheduler reported one.
    pub job_id: Option<u32>,
}

impl ProcessRun {
    /// A run that has not started yet.
    pub fn new(process_name: impl Into<String>, submitter: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_name: process_name.into(),
            submitter: submitter.into(),
            start_date: None,
            end_date: None,
            exit_value: -1,
            job_id: None,
        }
    }
}

/// Classification of the error that stopped a task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The submission command could not be launched.
    Submission,
    /// The job ran and reported a non-zero exit code.
    NonZeroExit,
    /// Scheduler output could not be parsed.
    Parse,
    /// The monitored output vanished before the job finished.
    ExternalDeletion,
    /// The backend does not support the requested operation.
    Unsupported,
    /// The configured wait duration expired.
    Timeout,
    /// Anything else raised while executing a step.
    Other,
}

/// Diagnostics kept for a failed task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct TaskFailure {
    pub process_name: String,
    pub step_index: usize,
    pub kind: FailureKind,
    pub exit_code: i32,
    pub message: String,
    pub output: Vec<String>,
    pub execution_host: Option<String>,
}

/// A pipeline bound to parameter values, priority and submitter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct Task {
    #[ts(type = "string")]
    pub id: Uuid,

    /// Display name, also used to derive scheduler job names.
    pub name: String,

    pub pipeline_name: String,

    /// Parameter values keyed by parameter name.
    pub parameter_values: BTreeMap<String, String>,

    pub priority: Priority,

    pub submitter: String,

    pub creation_date: DateTime<Utc>,

    pub start_date: Option<DateTime<Utc>>,

    pub completion_date: Option<DateTime<Utc>>,

    /// Zero-based index of the step being run, or of the step the task
    /// stopped at. Never decreases.
    pub current_execution_index: usize,

    pub state: TaskState,

    /// One entry per attempted step, in order.
    pub process_runs: Vec<ProcessRun>,

    /// Set when the task ends in `Failed`.
    pub failure: Option<TaskFailure>,
}
