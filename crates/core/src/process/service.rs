//! Runs process commands inside an execution context.

use crate::context::ExecutionContext;
use crate::locality::{AbortSignal, ExecutionError, ExecutionResult};
use crate::process::command::ProcessCommand;
use crate::scheduler::{ExitStatusType, WaitTarget};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Per-job settings applied to a copy of the base context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_name: String,
    pub output_dir: PathBuf,
    pub threads: u32,
    pub memory_mb: u32,
    /// Dispatch in the background instead of waiting.
    pub parallel: bool,
}

impl JobSpec {
    pub fn new(job_name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            output_dir: output_dir.into(),
            threads: 0,
            memory_mb: 0,
            parallel: false,
        }
    }

    pub fn with_resources(mut self, threads: u32, memory_mb: u32) -> Self {
        self.threads = threads;
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// `<output_dir>/<job_name>.log`.
    pub fn monitor_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}.log", self.job_name))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessService;

impl ProcessService {
    pub fn new() -> Self {
        Self
    }

    /// Run `process` in `ctx`.
    ///
    /// Pre-commands configured for the process name run first. A scheduled
    /// foreground job is monitored to completion, a scheduled background job
    /// is dispatched, and an unscheduled job runs directly with its output
    /// copied to the context's monitor file.
    #[instrument(skip_all, fields(process = process.name(), locality = ctx.locality.name()))]
    pub async fn execute(
        &self,
        process: &ProcessCommand,
        ctx: &ExecutionContext,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut process = process.clone();
        if let Some(pre_command) = ctx.pre_command(process.name()).filter(|c| !c.trim().is_empty()) {
            debug!(pre_command, "adding configured pre-command");
            process.prepend_pre_command(pre_command);
        }
        let command = process.full_command()?;
        self.execute_command(&command, ctx, abort).await
    }

    /// Run an already assembled shell command in `ctx`.
    pub async fn execute_command(
        &self,
        command: &str,
        ctx: &ExecutionContext,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        ctx.locality.establish_connection().await?;
        let result = self.run(command, ctx, abort).await;
        if let Err(e) = ctx.locality.disconnect().await {
            warn!(error = %e, "failed to disconnect");
        }
        result
    }

    async fn run(
        &self,
        command: &str,
        ctx: &ExecutionContext,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        match (ctx.scheduler.as_deref(), ctx.foreground) {
            (Some(scheduler), true) => {
                info!(scheduler = scheduler.name(), "running scheduled command in foreground");
                ctx.locality
                    .monitored_execute(command, scheduler, abort, ctx.wait_timeout)
                    .await
            }
            (Some(scheduler), false) => {
                info!(scheduler = scheduler.name(), "dispatching scheduled command");
                ctx.locality.dispatch(command, scheduler).await
            }
            (None, true) => {
                info!(%command, "running command");
                let result = ctx.locality.execute(command, abort).await?;
                if let Some(path) = ctx.monitor_file() {
                    write_output(path, &result.output).await?;
                }
                Ok(result)
            }
            (None, false) => Err(ExecutionError::BackgroundWithoutScheduler),
        }
    }

    /// Copy `base`, point it at `job`, and run `process` there.
    pub async fn execute_job(
        &self,
        process: &ProcessCommand,
        base: &ExecutionContext,
        job: &JobSpec,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let ctx = job_context(base, job);
        self.execute(process, &ctx, abort).await
    }

    /// Block until earlier background jobs reach `status`.
    ///
    /// Waits on `job_ids` when the scheduler reports ids on submission and
    /// on the `name_pattern` otherwise.
    #[instrument(skip(self, base, abort))]
    pub async fn execute_scheduled_wait(
        &self,
        job_ids: &[u32],
        name_pattern: &str,
        status: ExitStatusType,
        job: &JobSpec,
        base: &ExecutionContext,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let ctx = job_context(base, &JobSpec { parallel: false, ..job.clone() });
        let Some(scheduler) = ctx.scheduler.as_deref() else {
            return Err(ExecutionError::SchedulerRequired("a scheduled wait"));
        };

        let target = if scheduler.generates_job_id_from_output() {
            WaitTarget::JobIds(job_ids.to_vec())
        } else {
            WaitTarget::Name(name_pattern.to_string())
        };
        let condition = scheduler.create_wait_condition(status, &target)?;
        info!(%condition, "waiting on scheduler condition");

        ctx.locality.establish_connection().await?;
        let result = ctx
            .locality
            .wait_for(&condition, scheduler, abort, ctx.wait_timeout)
            .await;
        if let Err(e) = ctx.locality.disconnect().await {
            warn!(error = %e, "failed to disconnect");
        }
        result
    }

    /// Whether `executable` resolves on this host's `PATH`.
    pub fn executable_on_path(&self, executable: &str) -> bool {
        which::which(executable).is_ok()
    }

    /// Whether `process` looks runnable in `ctx`.
    ///
    /// With a configured pre-command the lookup runs through the locality
    /// after the pre-command, since it may change `PATH`.
    pub async fn is_process_operational(
        &self,
        process: &ProcessCommand,
        ctx: &ExecutionContext,
    ) -> bool {
        let Some(pre_command) = ctx.pre_command(process.name()) else {
            return self.executable_on_path(process.executable());
        };
        let probe = format!("{pre_command}; which {}", process.executable());
        match ctx.locality.execute(&probe, &AbortSignal::new()).await {
            Ok(result) => result.succeeded() && result.first_output_line().is_some(),
            Err(e) => {
                warn!(error = %e, "operational check failed");
                false
            }
        }
    }
}

fn job_context(base: &ExecutionContext, job: &JobSpec) -> ExecutionContext {
    let mut ctx = base.copy();
    ctx.set_context(&job.job_name, !job.parallel, Some(job.monitor_file()));
    ctx.set_resources(job.threads, job.memory_mb);
    ctx
}

async fn write_output(path: &Path, output: &[String]) -> Result<(), ExecutionError> {
    let io_error = |source| ExecutionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    for line in output {
        file.write_all(line.as_bytes()).await.map_err(io_error)?;
        file.write_all(b"\n").await.map_err(io_error)?;
    }
    file.flush().await.map_err(io_error)
}
