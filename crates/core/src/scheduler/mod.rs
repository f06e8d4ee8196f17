//! Batch scheduler abstraction.
//!
//! Schedulers expose no API beyond their command-line tools and the text
//! those tools print. A `Scheduler` turns structured `SchedulerArgs` into the
//! backend's submit, kill and wait commands, renders dependency clauses, and
//! parses job ids out of submission output.
//!
//! Backends: [`LsfScheduler`], [`PbsScheduler`], [`OgeScheduler`], selected by
//! name through [`SchedulerFactory`].

pub mod args;
pub mod error;
pub mod exit_status;
pub mod lsf;
pub mod oge;
pub mod pbs;

pub use args::{JobArrayArgs, SchedulerArgs};
pub use error::{SchedulerError, SchedulerResult};
pub use exit_status::{ExitStatusType, WaitTarget};
pub use lsf::LsfScheduler;
pub use oge::OgeScheduler;
pub use pbs::PbsScheduler;

use crate::monitor::{LineClassifier, ProcessMonitor};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Capability set every batch scheduler backend provides.
pub trait Scheduler: Send + Sync + Debug {
    /// Backend name, e.g. "LSF".
    fn name(&self) -> &'static str;

    /// The submission tool, e.g. "bsub".
    fn submit_command(&self) -> &'static str;

    fn args(&self) -> &SchedulerArgs;

    fn args_mut(&mut self) -> &mut SchedulerArgs;

    /// Wrap `command` in this backend's submission syntax.
    fn create_command(&self, command: &str, foreground: bool) -> String;

    /// A no-op submission that only finishes once `wait_condition` holds.
    fn create_wait_command(&self, wait_condition: &str) -> SchedulerResult<String>;

    fn create_kill_command(&self, job_id: &str) -> String;

    /// The backend's token for `status`.
    fn exit_status_token(&self, status: ExitStatusType) -> SchedulerResult<&'static str>;

    /// Render a dependency clause. Multiple job ids are ANDed.
    fn create_wait_condition(
        &self,
        status: ExitStatusType,
        target: &WaitTarget,
    ) -> SchedulerResult<String>;

    /// Parse the job id from a line of submission output.
    fn extract_job_id(&self, line: &str) -> SchedulerResult<u32>;

    /// Whether completion is detected by tailing the monitor file.
    fn uses_file_monitor(&self) -> bool;

    /// Whether submission output carries a job id.
    fn generates_job_id_from_output(&self) -> bool;

    /// Placeholder the backend substitutes with the job-array index.
    fn job_index_token(&self) -> &'static str;

    /// Classifier for this backend's monitor file, if it uses one.
    fn line_classifier(&self) -> Option<Arc<dyn LineClassifier>> {
        None
    }

    /// Deep copy including the args.
    fn copy(&self) -> Box<dyn Scheduler>;

    /// The files to monitor: one per job-array index, or the monitor file.
    fn monitor_targets(&self) -> SchedulerResult<Vec<PathBuf>> {
        let Some(monitor_file) = self.args().monitor_file.clone() else {
            return if self.uses_file_monitor() {
                Err(SchedulerError::MissingMonitorFile(self.name()))
            } else {
                Ok(Vec::new())
            };
        };

        match self.args().job_array {
            Some(array) => Ok(array
                .indices()
                .into_iter()
                .map(|index| {
                    let mut name = monitor_file.clone().into_os_string();
                    name.push(format!(".{index}"));
                    PathBuf::from(name)
                })
                .collect()),
            None => Ok(vec![monitor_file]),
        }
    }

    /// A monitor for `target`, for backends that tail an output file.
    fn create_monitor(&self, target: PathBuf) -> Option<ProcessMonitor> {
        self.line_classifier()
            .map(|classifier| ProcessMonitor::new(target, self.args().monitor_interval, classifier))
    }
}

impl Clone for Box<dyn Scheduler> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Selects a scheduler backend by name.
pub struct SchedulerFactory;

impl SchedulerFactory {
    /// Create the backend called `name` (case-insensitive) with `args`.
    ///
    /// # Examples
    ///
    /// ```
    /// use px_core::scheduler::{SchedulerArgs, SchedulerFactory};
    ///
    /// let scheduler = SchedulerFactory::create("lsf", SchedulerArgs::default()).unwrap();
    /// assert_eq!(scheduler.name(), "LSF");
    /// ```
    pub fn create(name: &str, args: SchedulerArgs) -> SchedulerResult<Box<dyn Scheduler>> {
        match name.trim().to_ascii_uppercase().as_str() {
            "LSF" => Ok(Box::new(LsfScheduler::new(args))),
            "PBS" => Ok(Box::new(PbsScheduler::new(args))),
            "OGE" | "SGE" => Ok(Box::new(OgeScheduler::new(args))),
            _ => Err(SchedulerError::UnknownScheduler(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_backend() {
        for (name, expected) in [("LSF", "LSF"), ("pbs", "PBS"), ("Oge", "OGE")] {
            let scheduler = SchedulerFactory::create(name, SchedulerArgs::default()).unwrap();
            assert_eq!(scheduler.name(), expected);
        }
    }

    #[test]
    fn test_factory_rejects_unknown() {
        let err = SchedulerFactory::create("SLURM", SchedulerArgs::default()).unwrap_err();
        assert_eq!(err, SchedulerError::UnknownScheduler("SLURM".to_string()));
    }

    #[test]
    fn test_boxed_clone_is_deep() {
        let original = SchedulerFactory::create(
            "LSF",
            SchedulerArgs::default().with_job_name("first"),
        )
        .unwrap();
        let mut copy = original.clone();
        copy.args_mut().job_name = "second".to_string();
        assert_eq!(original.args().job_name, "first");
        assert_eq!(copy.args().job_name, "second");
    }

    #[test]
    fn test_monitor_targets_per_array_index() {
        let scheduler = LsfScheduler::new(
            SchedulerArgs::default()
                .with_monitor_file("/out/job.log")
                .with_job_array(JobArrayArgs::new(1, 3, 1, 3)),
        );
        assert_eq!(
            scheduler.monitor_targets().unwrap(),
            vec![
                PathBuf::from("/out/job.log.1"),
                PathBuf::from("/out/job.log.2"),
                PathBuf::from("/out/job.log.3"),
            ]
        );
    }

    #[test]
    fn test_monitor_targets_require_monitor_file_when_tailing() {
        let lsf = LsfScheduler::new(SchedulerArgs::default());
        assert_eq!(
            lsf.monitor_targets(),
            Err(SchedulerError::MissingMonitorFile("LSF"))
        );
        let pbs = PbsScheduler::new(SchedulerArgs::default());
        assert_eq!(pbs.monitor_targets(), Ok(Vec::new()));
    }

    #[test]
    fn test_only_lsf_creates_monitors() {
        let args = SchedulerArgs::default().with_monitor_file("/out/job.log");
        assert!(LsfScheduler::new(args.clone())
            .create_monitor(PathBuf::from("/out/job.log"))
            .is_some());
        assert!(PbsScheduler::new(args.clone())
            .create_monitor(PathBuf::from("/out/job.log"))
            .is_none());
        assert!(OgeScheduler::new(args)
            .create_monitor(PathBuf::from("/out/job.log"))
            .is_none());
    }
}
