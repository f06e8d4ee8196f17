//! Where and how a process runs.
//!
//! An `ExecutionContext` pairs a locality with an optional scheduler and the
//! foreground flag. The task driver copies a base context for every step and
//! adjusts the copy, so steps never share mutable scheduler state.

use crate::config::ExternalProcessConfig;
use crate::locality::{LocalLocality, Locality};
use crate::scheduler::Scheduler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub locality: Box<dyn Locality>,
    pub scheduler: Option<Box<dyn Scheduler>>,
    /// Whether callers block until the process finishes.
    pub foreground: bool,
    /// Where output is written. Mirrors the scheduler's monitor file.
    pub monitor_file: Option<PathBuf>,
    /// Pre-commands and other per-process settings.
    pub external_config: Option<Arc<ExternalProcessConfig>>,
    /// Upper bound on monitored waits. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Box::new(LocalLocality::new()))
    }
}

impl ExecutionContext {
    /// A foreground, unscheduled context on `locality`.
    pub fn new(locality: Box<dyn Locality>) -> Self {
        Self {
            locality,
            scheduler: None,
            foreground: true,
            monitor_file: None,
            external_config: None,
            wait_timeout: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_foreground(mut self, foreground: bool) -> Self {
        self.foreground = foreground;
        self
    }

    pub fn with_external_config(mut self, config: Arc<ExternalProcessConfig>) -> Self {
        self.external_config = Some(config);
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn uses_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn monitor_file(&self) -> Option<&Path> {
        self.monitor_file.as_deref()
    }

    /// Point this context at a new job.
    ///
    /// Sets the job name and monitor file on the scheduler args, when a
    /// scheduler is present, and records the foreground flag.
    pub fn set_context(&mut self, job_name: &str, foreground: bool, monitor_file: Option<PathBuf>) {
        self.foreground = foreground;
        if let Some(scheduler) = self.scheduler.as_mut() {
            let args = scheduler.args_mut();
            args.job_name = job_name.to_string();
            args.monitor_file = monitor_file.clone();
        }
        self.monitor_file = monitor_file;
    }

    /// Request resources for the next job. Zero keeps the scheduler default.
    pub fn set_resources(&mut self, threads: u32, memory_mb: u32) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            let args = scheduler.args_mut();
            if threads > 0 {
                args.threads = threads;
            }
            if memory_mb > 0 {
                args.memory_mb = memory_mb;
            }
        }
    }

    /// Deep copy, including the scheduler args.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// The pre-command configured for `process_name`, if any.
    pub fn pre_command(&self, process_name: &str) -> Option<&str> {
        self.external_config
            .as_deref()
            .and_then(|config| config.pre_command(process_name))
    }
}
