//! Placeholder for execution on another host.

use crate::locality::abort::AbortSignal;
use crate::locality::error::ExecutionError;
use crate::locality::{CommandStream, ExecutionResult, Locality};
use crate::scheduler::Scheduler;
use async_trait::async_trait;
use std::time::Duration;

/// A remote host. Every operation fails with `UnsupportedLocality`; commands
/// are never rerouted to the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocality {
    pub host: String,
}

impl RemoteLocality {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    fn unsupported(&self) -> ExecutionError {
        ExecutionError::UnsupportedLocality(format!("REMOTE ({})", self.host))
    }
}

#[async_trait]
impl Locality for RemoteLocality {
    fn name(&self) -> &'static str {
        "REMOTE"
    }

    async fn establish_connection(&self) -> Result<(), ExecutionError> {
        Err(self.unsupported())
    }

    async fn disconnect(&self) -> Result<(), ExecutionError> {
        Err(self.unsupported())
    }

    fn stream(&self, _command: &str, _abort: &AbortSignal) -> Result<CommandStream, ExecutionError> {
        Err(self.unsupported())
    }

    async fn execute(
        &self,
        _command: &str,
        _abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        Err(self.unsupported())
    }

    async fn monitored_execute(
        &self,
        _command: &str,
        _scheduler: &dyn Scheduler,
        _abort: &AbortSignal,
        _timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecutionError> {
        Err(self.unsupported())
    }

    async fn dispatch(
        &self,
        _command: &str,
        _scheduler: &dyn Scheduler,
    ) -> Result<ExecutionResult, ExecutionError> {
        Err(self.unsupported())
    }

    async fn wait_for(
        &self,
        _wait_condition: &str,
        _scheduler: &dyn Scheduler,
        _abort: &AbortSignal,
        _timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecutionError> {
        Err(self.unsupported())
    }

    fn copy(&self) -> Box<dyn Locality> {
        Box::new(self.clone())
    }
}
