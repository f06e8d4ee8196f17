//! Task manager for running many tasks concurrently.
//!
//! Each submitted task gets its own driver run on a tokio task. The manager
//! keeps a snapshot of every task, refreshed from the driver's events before
//! they are forwarded to the caller's channel.

use crate::locality::AbortSignal;
use crate::task::driver::TaskDriver;
use crate::task::state::create_task;
use anyhow::{anyhow, bail, Result};
use px_protocol::ipc::Event;
use px_protocol::pipeline_models::Pipeline;
use px_protocol::task_models::{Priority, Task, TaskState};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;

struct TaskEntry {
    task: Task,
    abort: AbortSignal,
    finished: watch::Sender<bool>,
}

/// Everything needed to create a task.
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub pipeline: Pipeline,
    pub parameter_values: BTreeMap<String, String>,
    pub priority: Priority,
    pub submitter: String,
}

impl Submission {
    pub fn new(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            pipeline,
            parameter_values: BTreeMap::new(),
            priority: Priority::default(),
            submitter: String::new(),
        }
    }

    pub fn with_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.parameter_values = values;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_submitter(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = submitter.into();
        self
    }
}

pub struct TaskManager {
    tasks: Arc<Mutex<HashMap<Uuid, TaskEntry>>>,
    driver: Arc<TaskDriver>,
    events_tx: mpsc::Sender<Event>,
}

impl TaskManager {
    /// # Arguments
    ///
    /// * `driver` - Shared by every task this manager runs
    /// * `events_tx` - Receives every event of every task
    pub fn new(driver: TaskDriver, events_tx: mpsc::Sender<Event>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            driver: Arc::new(driver),
            events_tx,
        }
    }

    /// Register a Pending task and start driving it in the background.
    ///
    /// Returns the task id immediately.
    pub async fn submit(&self, submission: Submission) -> Uuid {
        let Submission {
            name,
            pipeline,
            parameter_values,
            priority,
            submitter,
        } = submission;
        let task = create_task(name, &pipeline, parameter_values, priority, submitter);
        let task_id = task.id;
        let abort = AbortSignal::new();
        let (finished, _) = watch::channel(false);

        self.tasks.lock().await.insert(
            task_id,
            TaskEntry {
                task: task.clone(),
                abort: abort.clone(),
                finished,
            },
        );
        info!(task = %task_id, pipeline = %pipeline.name, "task submitted");

        let driver = Arc::clone(&self.driver);
        let tasks = Arc::clone(&self.tasks);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let (driver_tx, mut driver_rx) = mpsc::channel(EVENT_BUFFER);
            let drive = async move { driver.run(task, &pipeline, &driver_tx, &abort).await };
            let forward = async {
                while let Some(event) = driver_rx.recv().await {
                    if let Some(entry) = tasks.lock().await.get_mut(&task_id) {
                        apply_event(&mut entry.task, &event);
                    }
                    let _ = events_tx.send(event).await;
                }
            };
            let (outcome, ()) = tokio::join!(drive, forward);

            let mut tasks = tasks.lock().await;
            let Some(entry) = tasks.get_mut(&task_id) else {
                return;
            };
            match outcome {
                Ok(final_task) => entry.task = final_task,
                Err(e) => error!(task = %task_id, error = %e, "task driver failed"),
            }
            entry.finished.send_replace(true);
        });

        task_id
    }

    /// Ask a task to stop. The driver moves it to Aborted and best-effort
    /// kills its running job.
    pub async fn abort(&self, task_id: Uuid) -> Result<()> {
        let tasks = self.tasks.lock().await;
        let entry = tasks
            .get(&task_id)
            .ok_or_else(|| anyhow!("Task {task_id} not found"))?;
        if entry.task.state.is_terminal() {
            bail!("Task {task_id} already finished as {:?}", entry.task.state);
        }
        info!(task = %task_id, "abort requested");
        entry.abort.abort();
        Ok(())
    }

    pub async fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.tasks.lock().await.get(&task_id).map(|e| e.task.clone())
    }

    /// All tasks, oldest first.
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.collect(|_| true).await
    }

    pub async fn list_tasks_by_state(&self, state: TaskState) -> Vec<Task> {
        self.collect(|t| t.state == state).await
    }

    /// Wait until the task's driver has finished and return its final state.
    pub async fn wait_for_task(&self, task_id: Uuid) -> Result<Task> {
        let mut finished = {
            let tasks = self.tasks.lock().await;
            tasks
                .get(&task_id)
                .ok_or_else(|| anyhow!("Task {task_id} not found"))?
                .finished
                .subscribe()
        };
        finished
            .wait_for(|done| *done)
            .await
            .map_err(|_| anyhow!("Task {task_id} was dropped before finishing"))?;
        self.get_task(task_id)
            .await
            .ok_or_else(|| anyhow!("Task {task_id} not found"))
    }

    /// Forget every task whose driver has finished and return them, oldest
    /// first. Pending and running tasks are kept.
    ///
    /// Removed tasks are no longer visible to `get_task` or `wait_for_task`;
    /// persist them first if they are still needed.
    pub async fn remove_finished(&self) -> Vec<Task> {
        let mut tasks = self.tasks.lock().await;
        let done: Vec<Uuid> = tasks
            .iter()
            .filter(|(_, entry)| *entry.finished.borrow())
            .map(|(id, _)| *id)
            .collect();
        let mut removed: Vec<Task> = done
            .iter()
            .filter_map(|id| tasks.remove(id))
            .map(|entry| entry.task)
            .collect();
        removed.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
        if !removed.is_empty() {
            info!(count = removed.len(), "removed finished tasks");
        }
        removed
    }

    async fn collect(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let tasks = self.tasks.lock().await;
        let mut list: Vec<Task> = tasks
            .values()
            .map(|e| &e.task)
            .filter(|&t| keep(t))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
        list
    }
}

/// Mirror a driver event onto the manager's snapshot.
fn apply_event(task: &mut Task, event: &Event) {
    match event {
        Event::TaskStateChanged { task: snapshot, .. } => *task = snapshot.clone(),
        Event::ProcessStarted {
            step_index, run, ..
        } => {
            task.current_execution_index = task.current_execution_index.max(*step_index);
            task.process_runs.push(run.clone());
        }
        Event::ProcessEnded {
            step_index, run, ..
        } => {
            task.current_execution_index = task.current_execution_index.max(*step_index + 1);
            if let Some(existing) = task.process_runs.iter_mut().find(|r| r.id == run.id) {
                *existing = run.clone();
            }
        }
        Event::ProcessFailed { run, .. } => {
            if let Some(existing) = task.process_runs.iter_mut().find(|r| r.id == run.id) {
                *existing = run.clone();
            }
        }
        Event::TaskLog { .. } => {}
    }
}
