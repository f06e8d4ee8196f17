//! PBS/Torque backend (`qsub`, `qdel`).
//!
//! PBS can block on submission (`-W block=true`), so foreground jobs need no
//! monitor file; the submitting shell returns when the job ends.

use crate::scheduler::args::{ArgJoiner, SchedulerArgs};
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::scheduler::exit_status::{ExitStatusType, WaitTarget};
use crate::scheduler::Scheduler;

const QSUB: &str = "qsub";
const MAX_JOB_NAME_LEN: usize = 15;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PbsScheduler {
    args: SchedulerArgs,
}

/// PBS rejects job names over 15 characters; longer names are replaced by
/// the decimal form of their 32-bit polynomial-31 hash over UTF-16 units.
pub fn compress_job_name(job_name: &str) -> String {
    if job_name.chars().count() <= MAX_JOB_NAME_LEN {
        return job_name.to_string();
    }
    job_name
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .to_string()
}

impl PbsScheduler {
    pub fn new(args: SchedulerArgs) -> Self {
        Self { args }
    }

    fn simple_options(&self) -> String {
        let args = &self.args;
        let (stdout, stderr) = match args.monitor_file_string() {
            monitor if monitor.is_empty() => (String::new(), String::new()),
            monitor => (format!("{monitor}.stdout"), format!("{monitor}.stderr")),
        };

        let mut joiner = ArgJoiner::new();
        joiner
            .push("-V")
            .push_flag("-N", compress_job_name(&args.job_name))
            .push_flag("-q", &args.queue_name)
            .push_flag("-P", &args.project_name)
            .push_flag("-o", stdout)
            .push_flag("-e", stderr)
            .push(&args.extra_args);
        joiner.join(" ")
    }

    fn additional_options(&self, foreground: bool) -> String {
        let condition = self.args.wait_condition_str();
        if !foreground && condition.is_empty() {
            return String::new();
        }

        let mut joiner = ArgJoiner::new();
        joiner
            .push_if(foreground, "block=true")
            .push_if(!condition.is_empty(), format!("depend={condition}"));
        format!("-W {}", joiner.join(","))
    }

    fn resource_string(&self) -> String {
        let args = &self.args;
        if args.threads == 0 && args.memory_mb == 0 {
            return String::new();
        }

        let mut joiner = ArgJoiner::new();
        joiner
            .push_if(args.threads > 0, "select=1")
            .push_if(args.threads > 0, format!("ncpus={}", args.threads))
            .push_if(args.memory_mb > 0, format!("mem={}G", args.memory_gb()));
        format!("-l {}", joiner.join(":"))
    }

    fn job_array_string(&self) -> String {
        self.args
            .job_array
            .map(|array| {
                format!(
                    "-J {}-{}:{}",
                    array.min_index, array.max_index, array.step_index
                )
            })
            .unwrap_or_default()
    }

    /// Render the args as `qsub` options.
    pub fn render_args(&self, foreground: bool) -> String {
        let mut joiner = ArgJoiner::new();
        joiner
            .push(self.simple_options())
            .push(self.additional_options(foreground))
            .push(self.resource_string())
            .push(self.job_array_string());
        joiner.join(" ")
    }
}

impl Scheduler for PbsScheduler {
    fn name(&self) -> &'static str {
        "PBS"
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
        format!(
            "echo \"{command}\" | {QSUB} {}",
            self.render_args(foreground)
        )
    }

    fn create_wait_command(&self, wait_condition: &str) -> SchedulerResult<String> {
        let mut joiner = ArgJoiner::new();
        joiner
            .push(format!("echo \"sleep 1 2>&1\" | {QSUB}"))
            .push(format!("-W block=true,depend={wait_condition}"))
            .push_flag("-q", &self.args.queue_name);
        Ok(joiner.join(" "))
    }

    fn create_kill_command(&self, job_id: &str) -> String {
        format!("qdel {job_id}")
    }

    fn exit_status_token(&self, status: ExitStatusType) -> SchedulerResult<&'static str> {
        Ok(match status {
            ExitStatusType::CompletedSuccess => "afterok",
            ExitStatusType::CompletedFailed => "afternotok",
            ExitStatusType::CompletedAny => "afterany",
        })
    }

    fn create_wait_condition(
        &self,
        status: ExitStatusType,
        target: &WaitTarget,
    ) -> SchedulerResult<String> {
        let token = self.exit_status_token(status)?;
        match target {
            WaitTarget::Name(name) => Ok(format!("{token}:{name}")),
            WaitTarget::JobIds(ids) if ids.is_empty() => Err(SchedulerError::EmptyWaitCondition),
            WaitTarget::JobIds(ids) => {
                let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
                Ok(format!("{token}:{}", ids.join(":")))
            }
        }
    }

    /// `4176.UV00000010-P002` yields 4176.
    fn extract_job_id(&self, line: &str) -> SchedulerResult<u32> {
        line.trim()
            .split('.')
            .next()
            .and_then(|prefix| prefix.parse().ok())
            .ok_or_else(|| SchedulerError::JobIdParse {
                scheduler: "PBS",
                line: line.to_string(),
            })
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
