//! Fan-out of task lifecycle events to listeners.
//!
//! The hub drains the driver's event channel on its own tokio task, so
//! listeners are never invoked from inside a poll loop or a driver step.

use async_trait::async_trait;
use px_protocol::ipc::Event;
use px_protocol::task_models::{ProcessRun, Task, TaskState};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Receives task lifecycle notifications. Every method defaults to a no-op.
#[async_trait]
pub trait TaskListener: Send + Sync {
    async fn state_changed(&self, _task: &Task, _previous: TaskState) {}

    async fn process_started(&self, _task_id: Uuid, _step_index: usize, _run: &ProcessRun) {}

    async fn process_ended(&self, _task_id: Uuid, _step_index: usize, _run: &ProcessRun) {}

    async fn process_failed(
        &self,
        _task_id: Uuid,
        _step_index: usize,
        _run: &ProcessRun,
        _error: &str,
        _output: &[String],
    ) {
    }

    async fn task_log(&self, _task_id: Uuid, _content: &str) {}
}

#[derive(Default, Clone)]
pub struct ListenerHub {
    listeners: Vec<Arc<dyn TaskListener>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn TaskListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, in registration order.
    pub async fn dispatch(&self, event: &Event) {
        for listener in &self.listeners {
            match event {
                Event::TaskStateChanged { task, previous } => {
                    listener.state_changed(task, *previous).await
                }
                Event::ProcessStarted {
                    task_id,
                    step_index,
                    run,
                } => listener.process_started(*task_id, *step_index, run).await,
                Event::ProcessEnded {
                    task_id,
                    step_index,
                    run,
                } => listener.process_ended(*task_id, *step_index, run).await,
                Event::ProcessFailed {
                    task_id,
                    step_index,
                    run,
                    error,
                    output,
                } => {
                    listener
                        .process_failed(*task_id, *step_index, run, error, output)
                        .await
                }
                Event::TaskLog { task_id, content } => listener.task_log(*task_id, content).await,
            }
        }
    }

    /// Consume `events_rx` until every sender is dropped.
    pub fn spawn(self, mut events_rx: Receiver<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                self.dispatch(&event).await;
            }
        })
    }
}
