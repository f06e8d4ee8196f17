//! Oracle/Sun Grid Engine backend (`qsub`, `qdel`).
//!
//! Submission and kill work. Dependency chaining and job-id extraction are
//! not available for this backend and fail with `Unsupported`.

use crate::scheduler::args::{ArgJoiner, SchedulerArgs};
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::scheduler::exit_status::{ExitStatusType, WaitTarget};
use crate::scheduler::Scheduler;

const QSUB: &str = "qsub";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OgeScheduler {
    args: SchedulerArgs,
}

impl OgeScheduler {
    pub fn new(args: SchedulerArgs) -> Self {
        Self { args }
    }

    fn unsupported(&self, operation: &'static str) -> SchedulerError {
        SchedulerError::Unsupported {
            scheduler: "OGE",
            operation,
        }
    }

    /// Render the args as `qsub` options.
    pub fn render_args(&self, foreground: bool) -> String {
        let args = &self.args;
        let monitor_file = args.monitor_file_string();
        let array = args.job_array.map(|array| {
            format!(
                "-t {}-{}:{} -tc {}",
                array.min_index, array.max_index, array.step_index, array.max_simultaneous
            )
        });

        let mut joiner = ArgJoiner::new();
        joiner
            .push_flag("-N", &args.job_name)
            .push_flag("-q", &args.queue_name)
            .push_flag("-P", &args.project_name)
            .push_flag("-o", &monitor_file)
            .push_if(!monitor_file.is_empty(), "-j y")
            .push_if(args.threads > 1, format!("-pe smp {}", args.threads))
            .push_if(args.memory_mb > 0, format!("-l h_vmem={}M", args.memory_mb))
            .push(&args.extra_args)
            .push_if(foreground, "-sync y")
            .push(array.unwrap_or_default());
        joiner.join(" ")
    }
}

impl Scheduler for OgeScheduler {
    fn name(&self) -> &'static str {
        "OGE"
    }

    fn submit_command(&self) -> &'static str {
        QSUB
    }

    fn args(&self) -> &SchedulerArgs {
        &self.args
    }

    fn args_mut(&mut self) -> &mut SchedulerArgs {
        &mut self.args
    }

    fn create_command(&self, command: &str, foreground: bool) -> String {
        let mut joiner = ArgJoiner::new();
        joiner
            .push(format!("echo \"{command}\" | {QSUB}"))
            .push(self.render_args(foreground));
        joiner.join(" ")
    }

    fn create_wait_command(&self, _wait_condition: &str) -> SchedulerResult<String> {
        Err(self.unsupported("wait command"))
    }

    fn create_kill_command(&self, job_id: &str) -> String {
        format!("qdel {job_id}")
    }

    fn exit_status_token(&self, _status: ExitStatusType) -> SchedulerResult<&'static str> {
        Err(self.unsupported("exit status token"))
    }

    fn create_wait_condition(
        &self,
        _status: ExitStatusType,
        _target: &WaitTarget,
    ) -> SchedulerResult<String> {
        Err(self.unsupported("wait condition"))
    }

    fn extract_job_id(&self, _line: &str) -> SchedulerResult<u32> {
        Err(self.unsupported("job id extraction"))
    }

    fn uses_file_monitor(&self) -> bool {
        false
    }

    fn generates_job_id_from_output(&self) -> bool {
        false
    }

    fn job_index_token(&self) -> &'static str {
        "$SGE_TASK_ID"
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(self.clone())
    }
}
