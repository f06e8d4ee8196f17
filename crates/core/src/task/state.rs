//! Task state machine.
//!
//! Free functions that mutate a `Task` and emit the matching `Event`.
//! Legal transitions are Pending -> Running, Pending -> {Aborted, Failed}
//! and Running -> {Completed, Aborted, Failed}. Terminal states are final.

use chrono::Utc;
use px_protocol::ipc::Event;
use px_protocol::pipeline_models::Pipeline;
use px_protocol::task_models::{Priority, ProcessRun, Task, TaskFailure, TaskState};
use std::collections::BTreeMap;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};
use uuid::Uuid;

/// A new Pending task for `pipeline`.
pub fn create_task(
    name: impl Into<String>,
    pipeline: &Pipeline,
    parameter_values: BTreeMap<String, String>,
    priority: Priority,
    submitter: impl Into<String>,
) -> Task {
    Task {
        id: Uuid::new_v4(),
        name: name.into(),
        pipeline_name: pipeline.name.clone(),
        parameter_values,
        priority,
        submitter: submitter.into(),
        creation_date: Utc::now(),
        start_date: None,
        completion_date: None,
        current_execution_index: 0,
        state: TaskState::Pending,
        process_runs: Vec::new(),
        failure: None,
    }
}

pub fn is_valid_transition(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    matches!(
        (from, to),
        (Pending, Running) | (Pending, Aborted) | (Pending, Failed)
    ) || (from == Running && to.is_terminal())
}

/// Move `task` to `to` and emit `TaskStateChanged`.
///
/// Illegal transitions are ignored and reported as `false`.
async fn transition(task: &mut Task, to: TaskState, events_tx: &Sender<Event>) -> bool {
    let previous = task.state;
    if !is_valid_transition(previous, to) {
        warn!(task = %task.id, ?previous, ?to, "ignoring illegal state transition");
        return false;
    }

    task.state = to;
    let now = Utc::now();
    if to == TaskState::Running {
        task.start_date = Some(now);
    }
    if to.is_terminal() {
        task.completion_date = Some(now);
    }
    debug!(task = %task.id, ?previous, state = ?to, "task state changed");

    let _ = events_tx
        .send(Event::TaskStateChanged {
            task: task.clone(),
            previous,
        })
        .await;
    true
}

pub async fn start_task(task: &mut Task, events_tx: &Sender<Event>) -> bool {
    transition(task, TaskState::Running, events_tx).await
}

pub async fn complete_task(task: &mut Task, events_tx: &Sender<Event>) -> bool {
    transition(task, TaskState::Completed, events_tx).await
}

pub async fn abort_task(task: &mut Task, events_tx: &Sender<Event>) -> bool {
    transition(task, TaskState::Aborted, events_tx).await
}

/// Record `failure` and move to Failed.
pub async fn fail_task(task: &mut Task, failure: TaskFailure, events_tx: &Sender<Event>) -> bool {
    if task.state.is_terminal() {
        return false;
    }
    task.failure = Some(failure);
    transition(task, TaskState::Failed, events_tx).await
}

/// Append a started `ProcessRun` for step `step_index` and emit
/// `ProcessStarted`. The execution index only ever moves forward.
pub async fn begin_process_run(
    task: &mut Task,
    step_index: usize,
    process_name: &str,
    events_tx: &Sender<Event>,
) {
    task.current_execution_index = task.current_execution_index.max(step_index);
    let mut run = ProcessRun::new(process_name, task.submitter.clone());
    run.start_date = Some(Utc::now());
    task.process_runs.push(run.clone());

    let _ = events_tx
        .send(Event::ProcessStarted {
            task_id: task.id,
            step_index,
            run,
        })
        .await;
}

fn finish_last_run(task: &mut Task, exit_value: i32, job_id: Option<u32>) -> Option<ProcessRun> {
    let run = task.process_runs.last_mut()?;
    run.end_date = Some(Utc::now());
    run.exit_value = exit_value;
    run.job_id = job_id.or(run.job_id);
    Some(run.clone())
}

/// Close the current run with exit value 0 and emit `ProcessEnded`.
pub async fn end_process_run(
    task: &mut Task,
    step_index: usize,
    job_id: Option<u32>,
    events_tx: &Sender<Event>,
) {
    let Some(run) = finish_last_run(task, 0, job_id) else {
        warn!(task = %task.id, "no process run to end");
        return;
    };
    task.current_execution_index = task.current_execution_index.max(step_index + 1);
    let _ = events_tx
        .send(Event::ProcessEnded {
            task_id: task.id,
            step_index,
            run,
        })
        .await;
}

/// Close the current run with `exit_value` and emit `ProcessFailed`.
pub async fn fail_process_run(
    task: &mut Task,
    step_index: usize,
    exit_value: i32,
    job_id: Option<u32>,
    error: String,
    output: Vec<String>,
    events_tx: &Sender<Event>,
) {
    let Some(run) = finish_last_run(task, exit_value, job_id) else {
        warn!(task = %task.id, "no process run to fail");
        return;
    };
    let _ = events_tx
        .send(Event::ProcessFailed {
            task_id: task.id,
            step_index,
            run,
            error,
            output,
        })
        .await;
}

pub async fn log_to_task(task: &Task, events_tx: &Sender<Event>, message: String) {
    let _ = events_tx
        .send(Event::TaskLog {
            task_id: task.id,
            content: message,
        })
        .await;
}
