//! Execution on the machine running the driver.

use crate::locality::abort::AbortSignal;
use crate::locality::error::ExecutionError;
use crate::locality::{ExecutionResult, Locality};
use async_trait::async_trait;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, instrument, trace};

/// One item of a running command's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// A line from stdout or stderr, in arrival order.
    Line(String),
    /// The process ended. Signals map to -1.
    Exited(i32),
}

/// Combined output of a running command, ending with `Exited` or an error.
pub type CommandStream = Pin<Box<dyn Stream<Item = Result<CommandEvent, ExecutionError>> + Send>>;

/// Run `command` through `sh -c` and stream its combined output.
///
/// The stream ends after `Exited`, or after an `Aborted` error when `abort`
/// is raised first; the child is killed in that case and whenever the
/// stream is dropped early.
pub fn stream_command(command: String, abort: AbortSignal) -> CommandStream {
    let stream = async_stream::stream! {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                yield Err(ExecutionError::Launch { command: command.clone(), source });
                return;
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            yield Err(ExecutionError::Launch {
                command: command.clone(),
                source: std::io::Error::other("child output was not captured"),
            });
            return;
        };

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut aborted = false;

        while stdout_open || stderr_open {
            let next = tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => Some((true, line)),
                line = stderr_lines.next_line(), if stderr_open => Some((false, line)),
                _ = abort.aborted() => None,
            };
            match next {
                Some((_, Ok(Some(line)))) => yield Ok(CommandEvent::Line(line)),
                Some((true, _)) => stdout_open = false,
                Some((false, _)) => stderr_open = false,
                None => {
                    aborted = true;
                    break;
                }
            }
        }

        if aborted {
            let _ = child.start_kill();
            let _ = child.wait().await;
            yield Err(ExecutionError::Aborted);
            return;
        }

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = abort.aborted() => None,
        };
        let Some(status) = status else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            yield Err(ExecutionError::Aborted);
            return;
        };
        match status {
            Ok(status) => yield Ok(CommandEvent::Exited(status.code().unwrap_or(-1))),
            Err(source) => yield Err(ExecutionError::Launch { command: command.clone(), source }),
        }
    };

    Box::pin(stream)
}

/// Runs commands on this host.
#[derive(Debug, Clone, Default)]
pub struct LocalLocality;

impl LocalLocality {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Locality for LocalLocality {
    fn name(&self) -> &'static str {
        "LOCAL"
    }

    async fn establish_connection(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn stream(&self, command: &str, abort: &AbortSignal) -> Result<CommandStream, ExecutionError> {
        Ok(stream_command(command.to_string(), abort.clone()))
    }

    #[instrument(skip(self, abort))]
    async fn execute(
        &self,
        command: &str,
        abort: &AbortSignal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut stream = self.stream(command, abort)?;
        let mut output = Vec::new();
        let mut exit_code = -1;

        while let Some(event) = stream.next().await {
            match event? {
                CommandEvent::Line(line) => {
                    trace!(%line, "output");
                    output.push(line);
                }
                CommandEvent::Exited(code) => exit_code = code,
            }
        }

        debug!(exit_code, lines = output.len(), "command finished");
        Ok(ExecutionResult::new(exit_code, output))
    }

    fn copy(&self) -> Box<dyn Locality> {
        Box::new(self.clone())
    }
}
