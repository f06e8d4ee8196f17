//! Platform LSF backend (`bsub`, `bkill`).

use crate::monitor::{LineClassifier, LsfBannerClassifier};
use crate::scheduler::args::{ArgJoiner, SchedulerArgs};
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use crate::scheduler::exit_status::{ExitStatusType, WaitTarget};
use crate::scheduler::Scheduler;
use std::sync::Arc;

const BSUB: &str = "bsub";
const WAIT_JOB: &str = "\"sleep 1 2>&1\"";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LsfScheduler {
    args: SchedulerArgs,
    /// Address LSF mails the job report to (`-u`).
    backup_email: Option<String>,
}

impl LsfScheduler {
    pub fn new(args: SchedulerArgs) -> Self {
        Self {
            args,
            backup_email: None,
        }
    }

    pub fn with_backup_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.backup_email = (!email.trim().is_empty()).then_some(email);
        self
    }

    fn backup_email_option(&self) -> String {
        self.backup_email
            .as_deref()
            .map(|email| format!("-u {email}"))
            .unwrap_or_default()
    }

    /// `-R` resource requirement string, or empty.
    fn usage_string(&self) -> String {
        let args = &self.args;
        let rusage = if args.memory_mb > 0 {
            format!("rusage[mem={}]", args.memory_mb)
        } else {
            String::new()
        };
        let span = if args.threads > 1 {
            format!("span[ptile={}]", args.threads)
        } else {
            String::new()
        };
        let extra = args
            .extra_args
            .strip_prefix("-R")
            .map(str::trim)
            .unwrap_or_default();

        let requirement = format!("{rusage}{span}{extra}");
        if requirement.is_empty() {
            String::new()
        } else {
            format!("-R{requirement}")
        }
    }

    /// Render the args as `bsub` options.
    pub fn render_args(&self) -> String {
        let args = &self.args;
        let mut monitor_file = args.monitor_file_string();
        let job_name = match args.job_array {
            Some(array) => {
                if !monitor_file.is_empty() {
                    monitor_file.push_str(".%I");
                }
                format!(
                    "\"{}[{}-{}:{}]%{}\"",
                    args.job_name,
                    array.min_index,
                    array.max_index,
                    array.step_index,
                    array.max_simultaneous
                )
            }
            None => args.job_name.clone(),
        };
        let wait_condition = if args.wait_condition_str().is_empty() {
            String::new()
        } else {
            format!("\"{}\"", args.wait_condition_str())
        };

        let mut joiner = ArgJoiner::new();
        joiner
            .push_flag("-J", job_name)
            .push_flag("-q", &args.queue_name)
            .push_flag("-oo", monitor_file)
            .push_flag("-w", wait_condition)
            .push_if(args.threads > 1, format!("-n {}", args.threads))
            .push_flag("-P", &args.project_name)
            .push_if(args.openmpi, "-a openmpi")
            .push_if(!args.extra_args.starts_with("-R"), &args.extra_args)
            .push(self.usage_string());
        joiner.join(" ")
    }
}

impl Scheduler for LsfScheduler {
    fn name(&self) -> &'static str {
        "LSF"
    }

    fn submit_command(&self) -> &'static str {
        BSUB
    }

    fn args(&self) -> &SchedulerArgs {
        &self.args
    }

    fn args_mut(&mut self) -> &mut SchedulerArgs {
        &mut self.args
    }

    // LSF blocks on its own only with -K, so foreground jobs are observed
    // through the monitor file instead.
    fn create_command(&self, command: &str, _foreground: bool) -> String {
        let mut joiner = ArgJoiner::new();
        joiner
            .push(BSUB)
            .push(self.render_args())
            .push(self.backup_email_option())
            .push(format!("\"{command}\""));
        joiner.join(" ")
    }

    fn create_wait_command(&self, wait_condition: &str) -> SchedulerResult<String> {
        let mut joiner = ArgJoiner::new();
        joiner
            .push(BSUB)
            .push(self.backup_email_option())
            .push_flag("-oo", self.args.monitor_file_string())
            .push_flag("-w", format!("\"{wait_condition}\""))
            .push_flag("-q", &self.args.queue_name)
            .push(WAIT_JOB);
        Ok(joiner.join(" "))
    }

    fn create_kill_command(&self, job_id: &str) -> String {
        format!("bkill {job_id}")
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

    /// `Job <1234> is submitted to queue <normal>.` yields 1234.
    fn extract_job_id(&self, line: &str) -> SchedulerResult<u32> {
        let parse_error = || SchedulerError::JobIdParse {
            scheduler: "LSF",
            line: line.to_string(),
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 7 {
            return Err(parse_error());
        }
        tokens[1]
            .trim_start_matches('<')
            .trim_end_matches('>')
            .parse()
            .map_err(|_| parse_error())
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
