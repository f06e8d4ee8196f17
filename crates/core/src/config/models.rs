//! Configuration models for the `.px/` directory.
//!
//! These structs replace process-wide properties: everything an
//! `ExecutionContext` needs is read once and passed in explicitly.

use crate::config::error::ConfigResult;
use crate::context::ExecutionContext;
use crate::locality::LocalityFactory;
use crate::scheduler::{LsfScheduler, Scheduler, SchedulerArgs, SchedulerFactory};
use px_protocol::pipeline_models::Pipeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn default_locality() -> String {
    "LOCAL".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".px/output")
}

fn default_monitor_interval_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

/// `[execution.scheduler]` in `config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// "LSF", "PBS" or "OGE".
    pub name: String,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub extra_args: String,
    /// LSF only.
    #[serde(default)]
    pub backup_email: Option<String>,
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn args(&self) -> SchedulerArgs {
        SchedulerArgs::default()
            .with_queue(&self.queue)
            .with_project(&self.project)
            .with_extra_args(&self.extra_args)
            .with_monitor_interval(Duration::from_secs(self.monitor_interval_secs.max(1)))
    }

    pub fn build(&self) -> ConfigResult<Box<dyn Scheduler>> {
        let args = self.args();
        match &self.backup_email {
            Some(email) if self.name.eq_ignore_ascii_case("LSF") => {
                Ok(Box::new(LsfScheduler::new(args).with_backup_email(email)))
            }
            _ => Ok(SchedulerFactory::create(&self.name, args)?),
        }
    }
}

/// `[execution]` in `config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    #[serde(default = "default_locality")]
    pub locality: String,
    /// Host for remote localities.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    /// Where job logs go. Relative paths resolve against the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Absent waits forever.
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub foreground: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            locality: default_locality(),
            host: None,
            scheduler: None,
            output_dir: default_output_dir(),
            wait_timeout_secs: None,
            foreground: true,
        }
    }
}

impl ExecutionConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// Assemble the base context every task step is copied from.
    pub fn build_context(
        &self,
        external: Option<Arc<ExternalProcessConfig>>,
    ) -> ConfigResult<ExecutionContext> {
        let locality = LocalityFactory::create(&self.locality, self.host.as_deref())?;
        let mut ctx = ExecutionContext::new(locality)
            .with_foreground(self.foreground)
            .with_wait_timeout(self.wait_timeout());
        if let Some(scheduler) = &self.scheduler {
            ctx = ctx.with_scheduler(scheduler.build()?);
        }
        if let Some(external) = external {
            ctx = ctx.with_external_config(external);
        }
        Ok(ctx)
    }
}

/// Layout of `config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Per-process settings from `processes.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalProcessConfig {
    /// Process name to a shell command run before it.
    #[serde(default)]
    pub pre_commands: BTreeMap<String, String>,
}

impl ExternalProcessConfig {
    pub fn pre_command(&self, process_name: &str) -> Option<&str> {
        self.pre_commands.get(process_name).map(String::as_str)
    }
}

/// Everything under `.px/`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub execution: ExecutionConfig,
    pub processes: Arc<ExternalProcessConfig>,
    pub pipelines: Vec<Pipeline>,
}

impl AppConfig {
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn build_context(&self) -> ConfigResult<ExecutionContext> {
        self.execution
            .build_context(Some(Arc::clone(&self.processes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::scheduler::SchedulerError;

    #[test]
    fn test_execution_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(file.execution, ExecutionConfig::default());
        assert_eq!(file.execution.output_dir, PathBuf::from(".px/output"));
        assert!(file.execution.foreground);
    }

    #[test]
    fn test_build_scheduled_context() {
        let file: ConfigFile = toml::from_str(
            r#"
[execution]
wait_timeout_secs = 600

[execution.scheduler]
name = "lsf"
queue = "normal"
backup_email = "ops@example.org"
monitor_interval_secs = 5
"#,
        )
        .unwrap();

        let ctx = file.execution.build_context(None).unwrap();
        assert_eq!(ctx.wait_timeout, Some(Duration::from_secs(600)));
        let scheduler = ctx.scheduler.as_ref().unwrap();
        assert_eq!(scheduler.name(), "LSF");
        assert_eq!(scheduler.args().queue_name, "normal");
        assert_eq!(scheduler.args().monitor_interval, Duration::from_secs(5));
        assert!(scheduler
            .create_command("true", true)
            .contains("-u ops@example.org"));
    }

    #[test]
    fn test_unknown_scheduler_is_rejected() {
        let execution = ExecutionConfig {
            scheduler: Some(SchedulerConfig {
                name: "slurm".to_string(),
                queue: String::new(),
                project: String::new(),
                extra_args: String::new(),
                backup_email: None,
                monitor_interval_secs: 15,
            }),
            ..ExecutionConfig::default()
        };
        assert!(matches!(
            execution.build_context(None),
            Err(ConfigError::Scheduler(SchedulerError::UnknownScheduler(_)))
        ));
    }

    #[test]
    fn test_remote_locality_builds_but_is_unsupported() {
        let execution = ExecutionConfig {
            locality: "REMOTE".to_string(),
            host: Some("head".to_string()),
            ..ExecutionConfig::default()
        };
        let ctx = execution.build_context(None).unwrap();
        assert_eq!(ctx.locality.name(), "REMOTE");
    }
}
