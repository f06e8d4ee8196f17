//! A scheduler that "submits" by backgrounding a local shell.
//!
//! The background job writes an LSF-style report to the monitor file, so
//! monitored execution, job-id extraction and kills can be exercised on any
//! machine without a batch system.

#![allow(dead_code)]

use px_core::monitor::{LineClassifier, LsfBannerClassifier};
use px_core::scheduler::{
    ExitStatusType, LsfScheduler, PbsScheduler, Scheduler, SchedulerArgs, SchedulerError,
    SchedulerResult, WaitTarget,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SHELL_HOST: &str = "node42";

/// Job id printed by [`BlockingShellScheduler`] submissions.
pub const BLOCKING_JOB_ID: u32 = 4176;

#[derive(Debug, Clone)]
pub struct ShellScheduler {
    args: SchedulerArgs,
}

impl ShellScheduler {
    pub fn new() -> Self {
        Self {
            args: SchedulerArgs::default().with_monitor_interval(Duration::from_millis(25)),
        }
    }
}

impl Default for ShellScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ShellScheduler {
    fn name(&self) -> &'static str {
        "SHELL"
    }

    fn submit_command(&self) -> &'static str {
        "sh"
    }

    fn args(&self) -> &SchedulerArgs {
        &self.args
    }

    fn args_mut(&mut self) -> &mut SchedulerArgs {
        &mut self.args
    }

    fn create_command(&self, command: &str, _foreground: bool) -> String {
        let monitor = self
            .args
            .monitor_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "/dev/null".to_string());
        format!(
            "( {{ echo 'Job was executed on host <{SHELL_HOST}>'; \
             echo 'The output (if any) follows:'; \
             ( {command} ); rc=$?; \
             if [ $rc -eq 0 ]; then echo 'Successfully completed.'; \
             else echo \"Exited with exit code $rc.\"; fi; }} > '{monitor}' 2>&1 ) \
             > /dev/null 2>&1 & \
             echo \"Job <$!> is submitted to queue <local>.\""
        )
    }

    fn create_wait_command(&self, _wait_condition: &str) -> SchedulerResult<String> {
        Ok(self.create_command("true", true))
    }

    fn create_kill_command(&self, job_id: &str) -> String {
        format!("kill {job_id} 2>/dev/null; true")
    }

    fn exit_status_token(&self, status: ExitStatusType) -> SchedulerResult<&'static str> {
        Ok(match status {
            ExitStatusType::CompletedSuccess => "done",
            ExitStatusType::CompletedFailed | ExitStatusType::CompletedAny => "ended",
        })
    }

    fn create_wait_condition(
        &self,
        status: ExitStatusType,
        target: &WaitTarget,
    ) -> SchedulerResult<String> {
        let token = self.exit_status_token(status)?;
        match target {
            WaitTarget::Name(name) => Ok(format!("{token}({name})")),
            WaitTarget::JobIds(ids) if ids.is_empty() => Err(SchedulerError::EmptyWaitCondition),
            WaitTarget::JobIds(ids) => Ok(ids
                .iter()
                .map(|id| format!("{token}({id})"))
                .collect::<Vec<_>>()
                .join(" && ")),
        }
    }

    fn extract_job_id(&self, line: &str) -> SchedulerResult<u32> {
        LsfScheduler::default().extract_job_id(line)
    }

    fn uses_file_monitor(&self) -> bool {
        true
    }

    fn generates_job_id_from_output(&self) -> bool {
        true
    }

    fn job_index_token(&self) -> &'static str {
        "%I"
    }

    fn line_classifier(&self) -> Option<Arc<dyn LineClassifier>> {
        Some(Arc::new(LsfBannerClassifier))
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(self.clone())
    }
}

/// A scheduler whose submission blocks until the job ends, the way
/// `qsub -W block=true` does. It prints a PBS-style job id first and has no
/// monitor file. Kill commands record the job id in `kill_marker`.
#[derive(Debug, Clone)]
pub struct BlockingShellScheduler {
    args: SchedulerArgs,
    kill_marker: PathBuf,
}

impl BlockingShellScheduler {
    pub fn new(kill_marker: &Path) -> Self {
        Self {
            args: SchedulerArgs::default(),
            kill_marker: kill_marker.to_path_buf(),
        }
    }
}

impl Scheduler for BlockingShellScheduler {
    fn name(&self) -> &'static str {
        "BLOCKING"
    }

    fn submit_command(&self) -> &'static str {
        "sh"
    }

    fn args(&self) -> &SchedulerArgs {
        &self.args
    }

    fn args_mut(&mut self) -> &mut SchedulerArgs {
        &mut self.args
    }

    fn create_command(&self, command: &str, _foreground: bool) -> String {
        format!("echo '{BLOCKING_JOB_ID}.local'; ( {command} )")
    }

    fn create_wait_command(&self, _wait_condition: &str) -> SchedulerResult<String> {
        Ok(self.create_command("true", true))
    }

    fn create_kill_command(&self, job_id: &str) -> String {
        format!("echo {job_id} > '{}'", self.kill_marker.display())
    }

    fn exit_status_token(&self, status: ExitStatusType) -> SchedulerResult<&'static str> {
        PbsScheduler::default().exit_status_token(status)
    }

    fn create_wait_condition(
        &self,
        status: ExitStatusType,
        target: &WaitTarget,
    ) -> SchedulerResult<String> {
        PbsScheduler::default().create_wait_condition(status, target)
    }

    fn extract_job_id(&self, line: &str) -> SchedulerResult<u32> {
        PbsScheduler::default().extract_job_id(line)
    }

    fn uses_file_monitor(&self) -> bool {
        false
    }

    fn generates_job_id_from_output(&self) -> bool {
        true
    }

    fn job_index_token(&self) -> &'static str {
        "$PBS_ARRAY_INDEX"
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(self.clone())
    }
}
