//! Structured job-submission options shared by every scheduler.
//!
//! `SchedulerArgs` is a plain value: each scheduler renders it into its own
//! flag syntax, and cloning produces an independent deep copy so a pipeline
//! step can adjust its job name or monitor file without touching history.

use crate::monitor::process_monitor::DEFAULT_MONITOR_INTERVAL;
use std::path::PathBuf;
use std::time::Duration;

/// Job-array request: indices `min..=max` stepping by `step`, with at most
/// `max_simultaneous` running at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobArrayArgs {
    pub min_index: u32,
    pub max_index: u32,
    pub step_index: u32,
    pub max_simultaneous: u32,
}

impl Default for JobArrayArgs {
    fn default() -> Self {
        Self {
            min_index: 1,
            max_index: 1,
            step_index: 1,
            max_simultaneous: 1,
        }
    }
}

impl JobArrayArgs {
    pub fn new(min_index: u32, max_index: u32, step_index: u32, max_simultaneous: u32) -> Self {
        Self {
            min_index,
            max_index,
            step_index,
            max_simultaneous,
        }
    }

    /// Every index the array will run.
    pub fn indices(&self) -> Vec<u32> {
        let step = self.step_index.max(1) as usize;
        (self.min_index..=self.max_index).step_by(step).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerArgs {
    pub job_name: String,
    pub queue_name: String,
    pub project_name: String,
    /// 0 leaves the scheduler default.
    pub threads: u32,
    /// 0 leaves the scheduler default.
    pub memory_mb: u32,
    /// Passed through verbatim.
    pub extra_args: String,
    pub openmpi: bool,
    /// Dependency clause already rendered for this scheduler.
    pub wait_condition: Option<String>,
    pub monitor_file: Option<PathBuf>,
    pub monitor_interval: Duration,
    pub job_array: Option<JobArrayArgs>,
}

impl Default for SchedulerArgs {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            queue_name: String::new(),
            project_name: String::new(),
            threads: 0,
            memory_mb: 0,
            extra_args: String::new(),
            openmpi: false,
            wait_condition: None,
            monitor_file: None,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            job_array: None,
        }
    }
}

impl SchedulerArgs {
    pub fn memory_gb(&self) -> u32 {
        self.memory_mb / 1000
    }

    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn with_project(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_extra_args(mut self, extra_args: impl Into<String>) -> Self {
        self.extra_args = extra_args.into();
        self
    }

    pub fn with_openmpi(mut self, openmpi: bool) -> Self {
        self.openmpi = openmpi;
        self
    }

    pub fn with_wait_condition(mut self, wait_condition: impl Into<String>) -> Self {
        self.wait_condition = Some(wait_condition.into());
        self
    }

    pub fn with_monitor_file(mut self, monitor_file: impl Into<PathBuf>) -> Self {
        self.monitor_file = Some(monitor_file.into());
        self
    }

    pub fn with_monitor_interval(mut self, monitor_interval: Duration) -> Self {
        self.monitor_interval = monitor_interval;
        self
    }

    pub fn with_job_array(mut self, job_array: JobArrayArgs) -> Self {
        self.job_array = Some(job_array);
        self
    }

    pub(crate) fn wait_condition_str(&self) -> &str {
        self.wait_condition.as_deref().unwrap_or_default()
    }

    pub(crate) fn monitor_file_string(&self) -> String {
        self.monitor_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Joins the non-empty pieces of a command line.
#[derive(Debug, Default)]
pub(crate) struct ArgJoiner {
    parts: Vec<String>,
}

impl ArgJoiner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `value` if it is not blank.
    pub(crate) fn push(&mut self, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.parts.push(value.to_string());
        }
        self
    }

    /// Add `flag value` if `value` is not blank.
    pub(crate) fn push_flag(&mut self, flag: &str, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.parts.push(format!("{flag} {value}"));
        }
        self
    }

    /// Add `value` only when `condition` holds.
    pub(crate) fn push_if(&mut self, condition: bool, value: impl AsRef<str>) -> &mut Self {
        if condition {
            self.push(value);
        }
        self
    }

    pub(crate) fn join(&self, separator: &str) -> String {
        self.parts.join(separator)
    }
}
