//! Task driver.
//!
//! Runs one task through its pipeline, step by step, on copies of a base
//! execution context. The first failing step halts the pipeline; nothing is
//! retried here.

use crate::context::ExecutionContext;
use crate::locality::{AbortSignal, ExecutionError, ExecutionResult};
use crate::monitor::MonitorError;
use crate::process::{JobSpec, ProcessCommand, ProcessService};
use crate::scheduler::SchedulerError;
use crate::task::state::{
    abort_task, begin_process_run, complete_task, end_process_run, fail_process_run, fail_task,
    log_to_task, start_task,
};
use anyhow::{bail, Result};
use px_protocol::ipc::Event;
use px_protocol::pipeline_models::{Pipeline, ProcessDefinition};
use px_protocol::task_models::{FailureKind, Task, TaskFailure, TaskState};
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;
use tracing::{info, instrument, warn};

pub struct TaskDriver {
    service: ProcessService,
    base_context: ExecutionContext,
    output_dir: PathBuf,
}

impl TaskDriver {
    /// # Arguments
    ///
    /// * `base_context` - Copied for every step, never mutated
    /// * `output_dir` - Where per-step monitor files are written
    pub fn new(base_context: ExecutionContext, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            service: ProcessService::new(),
            base_context,
            output_dir: output_dir.into(),
        }
    }

    pub fn base_context(&self) -> &ExecutionContext {
        &self.base_context
    }

    /// Run `task` from its current execution index to a terminal state.
    ///
    /// Returns the task in its final state. Step failures are recorded on the
    /// task rather than returned; an error means the task and pipeline do not
    /// belong together.
    #[instrument(skip_all, fields(task = %task.id, pipeline = %pipeline.name))]
    pub async fn run(
        &self,
        mut task: Task,
        pipeline: &Pipeline,
        events_tx: &Sender<Event>,
        abort: &AbortSignal,
    ) -> Result<Task> {
        if task.pipeline_name != pipeline.name {
            bail!(
                "task {} belongs to pipeline '{}', not '{}'",
                task.id,
                task.pipeline_name,
                pipeline.name
            );
        }
        if task.state.is_terminal() {
            bail!("task {} is already {:?}", task.id, task.state);
        }

        if abort.is_aborted() {
            abort_task(&mut task, events_tx).await;
            return Ok(task);
        }
        if task.state == TaskState::Pending {
            start_task(&mut task, events_tx).await;
        }

        let start = task.current_execution_index;
        for (step_index, definition) in pipeline.processes.iter().enumerate().skip(start) {
            if abort.is_aborted() {
                info!(step_index, "abort requested between steps");
                abort_task(&mut task, events_tx).await;
                return Ok(task);
            }

            log_to_task(
                &task,
                events_tx,
                format!("Running step {step_index}: {}", definition.name),
            )
            .await;
            begin_process_run(&mut task, step_index, &definition.name, events_tx).await;

            let outcome = self.run_step(&task, step_index, definition, abort).await;
            match outcome {
                Ok(result) if result.succeeded() => {
                    end_process_run(&mut task, step_index, result.job_id, events_tx).await;
                }
                Ok(result) => {
                    let message = format!(
                        "{} exited with code {}",
                        definition.name, result.exit_code
                    );
                    warn!(step_index, exit_code = result.exit_code, "step failed");
                    fail_process_run(
                        &mut task,
                        step_index,
                        result.exit_code,
                        result.job_id,
                        message.clone(),
                        result.output.clone(),
                        events_tx,
                    )
                    .await;
                    let failure = TaskFailure {
                        process_name: definition.name.clone(),
                        step_index,
                        kind: FailureKind::NonZeroExit,
                        exit_code: result.exit_code,
                        message,
                        output: result.output,
                        execution_host: result.execution_host,
                    };
                    fail_task(&mut task, failure, events_tx).await;
                    return Ok(task);
                }
                Err(ExecutionError::Aborted) => {
                    info!(step_index, "step aborted");
                    fail_process_run(
                        &mut task,
                        step_index,
                        -1,
                        None,
                        ExecutionError::Aborted.to_string(),
                        Vec::new(),
                        events_tx,
                    )
                    .await;
                    abort_task(&mut task, events_tx).await;
                    return Ok(task);
                }
                Err(e) => {
                    let kind = failure_kind(&e);
                    let output = error_output(&e);
                    warn!(step_index, error = %e, ?kind, "step raised an error");
                    fail_process_run(
                        &mut task,
                        step_index,
                        -1,
                        None,
                        e.to_string(),
                        output.clone(),
                        events_tx,
                    )
                    .await;
                    let failure = TaskFailure {
                        process_name: definition.name.clone(),
                        step_index,
                        kind,
                        exit_code: -1,
                        message: e.to_string(),
                        output,
                        execution_host: None,
                    };
                    fail_task(&mut task, failure, events_tx).await;
                    return Ok(task);
                }
            }
        }

        complete_task(&mut task, events_tx).await;
        Ok(task)
    }

    async fn run_step(
        &self,
        task: &Task,
        step_index: usize,
        definition: &ProcessDefinition,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let job = JobSpec::new(job_name(task, step_index, definition), &self.output_dir)
            .with_resources(definition.threads, definition.memory_mb);
        let process = ProcessCommand::from_values(definition.clone(), &task.parameter_values);
        self.service
            .execute_job(&process, &self.base_context, &job, abort)
            .await
    }
}

/// `<task>-<step>-<process>` with whitespace replaced, safe as a job name
/// and a file name.
pub fn job_name(task: &Task, step_index: usize, definition: &ProcessDefinition) -> String {
    format!("{}-{step_index}-{}", task.name, definition.name)
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect()
}

/// Map an execution error onto the failure taxonomy recorded on the task.
pub fn failure_kind(error: &ExecutionError) -> FailureKind {
    match error {
        ExecutionError::Launch { .. } | ExecutionError::Submission { .. } => {
            FailureKind::Submission
        }
        ExecutionError::Scheduler(SchedulerError::JobIdParse { .. })
        | ExecutionError::Monitor(MonitorError::BannerParse(_)) => FailureKind::Parse,
        ExecutionError::Monitor(MonitorError::ExternalDeletion { .. }) => {
            FailureKind::ExternalDeletion
        }
        ExecutionError::Monitor(MonitorError::Timeout(_)) => FailureKind::Timeout,
        ExecutionError::Scheduler(SchedulerError::Unsupported { .. })
        | ExecutionError::UnsupportedLocality(_)
        | ExecutionError::BackgroundWithoutScheduler
        | ExecutionError::SchedulerRequired(_) => FailureKind::Unsupported,
        _ => FailureKind::Other,
    }
}

fn error_output(error: &ExecutionError) -> Vec<String> {
    match error {
        ExecutionError::Submission { output, .. } => output.clone(),
        _ => Vec::new(),
    }
}
