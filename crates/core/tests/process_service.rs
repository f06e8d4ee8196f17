//! Process execution through a scheduler that writes job reports locally.

mod common;

use common::{BlockingShellScheduler, ShellScheduler, BLOCKING_JOB_ID, SHELL_HOST};
use px_core::context::ExecutionContext;
use px_core::locality::{AbortSignal, ExecutionError};
use px_core::process::{JobSpec, ProcessCommand, ProcessService};
use px_core::scheduler::ExitStatusType;
use px_protocol::pipeline_models::{Parameter, ProcessDefinition};
use std::collections::BTreeMap;
use std::time::Duration;

fn scheduled_context() -> ExecutionContext {
    ExecutionContext::default().with_scheduler(Box::new(ShellScheduler::new()))
}

fn echo(text: &str) -> ProcessCommand {
    let definition =
        ProcessDefinition::new("echo", "echo").with_parameter(Parameter::positional("text", 0));
    ProcessCommand::from_values(
        definition,
        &BTreeMap::from([("text".to_string(), text.to_string())]),
    )
}

#[tokio::test]
async fn test_monitored_execution_reads_the_job_report() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("greet", dir.path());

    let result = ProcessService::new()
        .execute_job(&echo("hello"), &scheduled_context(), &job, &AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, vec!["hello".to_string()]);
    assert_eq!(result.execution_host.as_deref(), Some(SHELL_HOST));
    assert!(result.job_id.is_some());
    assert!(job.monitor_file().exists());
}

#[tokio::test]
async fn test_monitored_execution_reports_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("broken", dir.path());
    let process = ProcessCommand::from_values(
        ProcessDefinition::new("broken", "echo partial; exit 5"),
        &BTreeMap::new(),
    );

    let result = ProcessService::new()
        .execute_job(&process, &scheduled_context(), &job, &AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 5);
    assert_eq!(result.output, vec!["partial".to_string()]);
}

#[tokio::test]
async fn test_background_dispatch_returns_job_id() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("bg", dir.path()).with_parallel(true);

    let result = ProcessService::new()
        .execute_job(&echo("later"), &scheduled_context(), &job, &AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.job_id.is_some());
}

#[tokio::test]
async fn test_scheduled_wait_completes() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("wait", dir.path());

    let result = ProcessService::new()
        .execute_scheduled_wait(
            &[10, 20],
            "",
            ExitStatusType::CompletedSuccess,
            &job,
            &scheduled_context(),
            &AbortSignal::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_abort_stops_monitored_job() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("nap", dir.path());
    let process =
        ProcessCommand::from_values(ProcessDefinition::new("nap", "sleep 30"), &BTreeMap::new());
    let abort = AbortSignal::new();

    let trigger = abort.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.abort();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        ProcessService::new().execute_job(&process, &scheduled_context(), &job, &abort),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(ExecutionError::Aborted)));
}

#[tokio::test]
async fn test_abort_kills_job_of_blocking_submission() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("killed");
    let ctx = ExecutionContext::default()
        .with_scheduler(Box::new(BlockingShellScheduler::new(&marker)));
    let job = JobSpec::new("held", dir.path());
    let process =
        ProcessCommand::from_values(ProcessDefinition::new("held", "sleep 30"), &BTreeMap::new());
    let abort = AbortSignal::new();

    let trigger = abort.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.abort();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        ProcessService::new().execute_job(&process, &ctx, &job, &abort),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(ExecutionError::Aborted)));

    let killed = std::fs::read_to_string(&marker).expect("kill command ran");
    assert_eq!(killed.trim(), BLOCKING_JOB_ID.to_string());
}

#[tokio::test]
async fn test_blocking_submission_reports_job_id_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ExecutionContext::default()
        .with_scheduler(Box::new(BlockingShellScheduler::new(&dir.path().join("killed"))));
    let job = JobSpec::new("quick", dir.path());
    let process = ProcessCommand::from_values(
        ProcessDefinition::new("quick", "echo done; exit 2"),
        &BTreeMap::new(),
    );

    let result = ProcessService::new()
        .execute_job(&process, &ctx, &job, &AbortSignal::new())
        .await
        .unwrap();
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.job_id, Some(BLOCKING_JOB_ID));
    assert!(!dir.path().join("killed").exists());
}

#[tokio::test]
async fn test_wait_timeout_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobSpec::new("slow", dir.path());
    let process =
        ProcessCommand::from_values(ProcessDefinition::new("slow", "sleep 30"), &BTreeMap::new());
    let ctx = scheduled_context().with_wait_timeout(Some(Duration::from_millis(300)));

    let result = ProcessService::new()
        .execute_job(&process, &ctx, &job, &AbortSignal::new())
        .await;
    assert!(matches!(
        result,
        Err(ExecutionError::Monitor(px_core::monitor::MonitorError::Timeout(_)))
    ));
}
