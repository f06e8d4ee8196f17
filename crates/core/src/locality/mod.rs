//! Where commands run.
//!
//! A `Locality` executes shell commands and knows how to drive a scheduler
//! through them: submit, wait on the scheduler's monitor, chain on wait
//! conditions, and kill on abort. `LocalLocality` runs on this host;
//! `RemoteLocality` is a named gap that fails every call.

pub mod abort;
pub mod error;
pub mod local;
pub mod remote;

pub use abort::AbortSignal;
pub use error::ExecutionError;
pub use local::{stream_command, CommandEvent, CommandStream, LocalLocality};
pub use remote::RemoteLocality;

use crate::monitor::ProcessMonitor;
use crate::scheduler::{Scheduler, SchedulerError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

/// What a command or scheduled job produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: Vec<String>,
    /// Set when the scheduler reported one on submission.
    pub job_id: Option<u32>,
    pub execution_host: Option<String>,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, output: Vec<String>) -> Self {
        Self {
            exit_code,
            output,
            job_id: None,
            execution_host: None,
        }
    }

    pub fn with_job_id(mut self, job_id: Option<u32>) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-blank output line.
    pub fn first_output_line(&self) -> Option<&str> {
        self.output
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }
}

#[async_trait]
pub trait Locality: Send + Sync + Debug {
    /// "LOCAL" or "REMOTE".
    fn name(&self) -> &'static str;

    async fn establish_connection(&self) -> Result<(), ExecutionError>;

    async fn disconnect(&self) -> Result<(), ExecutionError>;

    /// Start `command` and stream its output as it arrives.
    fn stream(&self, command: &str, abort: &AbortSignal) -> Result<CommandStream, ExecutionError>;

    /// Run `command` to completion and capture its output.
    async fn execute(
        &self,
        command: &str,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError>;

    /// Submit `command` as a foreground job and block until it finishes.
    ///
    /// `timeout` applies to each monitor target.
    async fn monitored_execute(
        &self,
        command: &str,
        scheduler: &dyn Scheduler,
        abort: &AbortSignal,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let submit = scheduler.create_command(command, true);
        submit_and_wait(self, &submit, scheduler, abort, timeout).await
    }

    /// Submit `command` as a background job and return once it is queued.
    async fn dispatch(
        &self,
        command: &str,
        scheduler: &dyn Scheduler,
    ) -> Result<ExecutionResult, ExecutionError> {
        let submit = scheduler.create_command(command, false);
        let submission = self.execute(&submit, &AbortSignal::new()).await?;
        if !submission.succeeded() {
            return Err(ExecutionError::Submission {
                exit_code: submission.exit_code,
                output: submission.output,
            });
        }
        let job_id = job_id_from(scheduler, &submission)?;
        info!(scheduler = scheduler.name(), ?job_id, "job dispatched");
        Ok(submission.with_job_id(job_id))
    }

    /// Block until `wait_condition` holds, using the scheduler's wait job.
    async fn wait_for(
        &self,
        wait_condition: &str,
        scheduler: &dyn Scheduler,
        abort: &AbortSignal,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let submit = scheduler.create_wait_command(wait_condition)?;
        submit_and_wait(self, &submit, scheduler, abort, timeout).await
    }

    fn copy(&self) -> Box<dyn Locality>;
}

impl Clone for Box<dyn Locality> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Selects a locality by name.
pub struct LocalityFactory;

impl LocalityFactory {
    /// Create "LOCAL" or "REMOTE" (case-insensitive). `host` only applies
    /// to remote localities.
    pub fn create(name: &str, host: Option<&str>) -> Result<Box<dyn Locality>, ExecutionError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Box::new(LocalLocality::new())),
            "REMOTE" => Ok(Box::new(RemoteLocality::new(host.unwrap_or_default()))),
            _ => Err(ExecutionError::UnknownLocality(name.to_string())),
        }
    }
}

fn job_id_from(
    scheduler: &dyn Scheduler,
    submission: &ExecutionResult,
) -> Result<Option<u32>, SchedulerError> {
    if !scheduler.generates_job_id_from_output() {
        return Ok(None);
    }
    let line = submission.first_output_line().unwrap_or_default();
    scheduler.extract_job_id(line).map(Some)
}

async fn remove_stale_target(path: &Path) -> Result<(), ExecutionError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ExecutionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale monitor file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ExecutionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn kill_job<L: Locality + ?Sized>(
    locality: &L,
    scheduler: &dyn Scheduler,
    job_id: Option<u32>,
) {
    let Some(job_id) = job_id else {
        warn!(scheduler = scheduler.name(), "no job id known, cannot kill job");
        return;
    };
    let command = scheduler.create_kill_command(&job_id.to_string());
    match locality.execute(&command, &AbortSignal::new()).await {
        Ok(result) if result.succeeded() => info!(job_id, "killed job"),
        Ok(result) => warn!(job_id, exit_code = result.exit_code, "kill command failed"),
        Err(e) => warn!(job_id, error = %e, "kill command failed"),
    }
}

/// Run a submission command, killing the job it created if `abort` fires.
///
/// Blocking submissions print the job id before they wait, so the lines
/// seen so far are enough to find the job to kill.
async fn run_submission<L: Locality + ?Sized>(
    locality: &L,
    submit: &str,
    scheduler: &dyn Scheduler,
    abort: &AbortSignal,
) -> Result<ExecutionResult, ExecutionError> {
    let mut stream = locality.stream(submit, abort)?;
    let mut output = Vec::new();
    let mut exit_code = -1;

    while let Some(event) = stream.next().await {
        match event {
            Ok(CommandEvent::Line(line)) => output.push(line),
            Ok(CommandEvent::Exited(code)) => exit_code = code,
            Err(ExecutionError::Aborted) => {
                drop(stream);
                let partial = ExecutionResult::new(-1, output);
                let job_id = job_id_from(scheduler, &partial).unwrap_or_else(|e| {
                    debug!(error = %e, "no job id in submission output");
                    None
                });
                kill_job(locality, scheduler, job_id).await;
                return Err(ExecutionError::Aborted);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(ExecutionResult::new(exit_code, output))
}

/// Run a submission command and wait for the job it creates.
///
/// Backends that tail a monitor file are waited on through a
/// `ProcessMonitor` per target; the others block in the submission command
/// itself, whose exit code is the job's.
#[instrument(skip(locality, scheduler, abort), fields(scheduler = scheduler.name()))]
async fn submit_and_wait<L: Locality + ?Sized>(
    locality: &L,
    submit: &str,
    scheduler: &dyn Scheduler,
    abort: &AbortSignal,
    timeout: Option<Duration>,
) -> Result<ExecutionResult, ExecutionError> {
    let monitors: Vec<ProcessMonitor> = scheduler
        .monitor_targets()?
        .into_iter()
        .filter_map(|target| scheduler.create_monitor(target))
        .collect();
    for monitor in &monitors {
        remove_stale_target(monitor.target()).await?;
    }

    let submission = run_submission(locality, submit, scheduler, abort).await?;
    if monitors.is_empty() {
        let job_id = job_id_from(scheduler, &submission)?;
        return Ok(submission.with_job_id(job_id));
    }
    if !submission.succeeded() {
        return Err(ExecutionError::Submission {
            exit_code: submission.exit_code,
            output: submission.output,
        });
    }
    let job_id = job_id_from(scheduler, &submission)?;
    info!(?job_id, targets = monitors.len(), "job submitted, monitoring");

    let mut result = ExecutionResult::new(0, Vec::new()).with_job_id(job_id);
    for monitor in &monitors {
        let waited = tokio::select! {
            code = monitor.wait_for_exit_code(timeout) => Some(code),
            _ = abort.aborted() => None,
        };
        let code = match waited {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                monitors.iter().for_each(ProcessMonitor::cancel);
                return Err(e.into());
            }
            None => {
                monitors.iter().for_each(ProcessMonitor::cancel);
                kill_job(locality, scheduler, job_id).await;
                return Err(ExecutionError::Aborted);
            }
        };
        if result.exit_code == 0 {
            result.exit_code = code;
        }
        result.output.extend(monitor.output().await);
        if result.execution_host.is_none() {
            result.execution_host = monitor.execution_host().await;
        }
    }

    debug!(exit_code = result.exit_code, "job finished");
    Ok(result)
}
