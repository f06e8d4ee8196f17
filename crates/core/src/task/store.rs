//! Task persistence.
//!
//! The store is fed through a listener, never from the driver directly.

use crate::task::listener::TaskListener;
use async_trait::async_trait;
use px_protocol::task_models::{ProcessRun, Task, TaskState};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Task {0} is already stored")]
    Duplicate(Uuid),

    #[error("Task {0} not found")]
    NotFound(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_task(&self, task: &Task) -> StoreResult<()>;

    async fn update_task(&self, task: &Task) -> StoreResult<()>;

    /// Insert or replace `run` (matched by id) on the stored task.
    async fn save_process_run(&self, task_id: Uuid, run: &ProcessRun) -> StoreResult<()>;

    async fn get_task(&self, task_id: Uuid) -> StoreResult<Option<Task>>;

    async fn tasks_by_state(&self, state: TaskState) -> StoreResult<Vec<Task>>;

    /// Tasks whose name contains `fragment`, case-insensitively.
    async fn search_tasks(&self, fragment: &str) -> StoreResult<Vec<Task>>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_creation(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
    tasks
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save_task(&self, task: &Task) -> StoreResult<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Duplicate(task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> StoreResult<()> {
        let mut tasks = self.tasks.lock().await;
        let stored = tasks.get_mut(&task.id).ok_or(StoreError::NotFound(task.id))?;
        *stored = task.clone();
        Ok(())
    }

    async fn save_process_run(&self, task_id: Uuid, run: &ProcessRun) -> StoreResult<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&task_id).ok_or(StoreError::NotFound(task_id))?;
        match task.process_runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => task.process_runs.push(run.clone()),
        }
        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tasks.lock().await.get(&task_id).cloned())
    }

    async fn tasks_by_state(&self, state: TaskState) -> StoreResult<Vec<Task>> {
        let tasks = self.tasks.lock().await;
        Ok(by_creation(
            tasks.values().filter(|t| t.state == state).cloned().collect(),
        ))
    }

    async fn search_tasks(&self, fragment: &str) -> StoreResult<Vec<Task>> {
        let needle = fragment.to_lowercase();
        let tasks = self.tasks.lock().await;
        Ok(by_creation(
            tasks
                .values()
                .filter(|t| t.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        ))
    }
}

/// Persists every lifecycle event through a `TaskStore`.
///
/// The first state change saves the task; later ones update it.
pub struct StoreWritingListener {
    store: Arc<dyn TaskStore>,
}

impl StoreWritingListener {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskListener for StoreWritingListener {
    async fn state_changed(&self, task: &Task, _previous: TaskState) {
        let result = match self.store.get_task(task.id).await {
            Ok(Some(_)) => self.store.update_task(task).await,
            Ok(None) => self.store.save_task(task).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(task = %task.id, error = %e, "failed to persist task");
        }
    }

    async fn process_started(&self, task_id: Uuid, _step_index: usize, run: &ProcessRun) {
        if let Err(e) = self.store.save_process_run(task_id, run).await {
            warn!(task = %task_id, error = %e, "failed to persist process run");
        }
    }

    async fn process_ended(&self, task_id: Uuid, _step_index: usize, run: &ProcessRun) {
        if let Err(e) = self.store.save_process_run(task_id, run).await {
            warn!(task = %task_id, error = %e, "failed to persist process run");
        }
    }

    async fn process_failed(
        &self,
        task_id: Uuid,
        _step_index: usize,
        run: &ProcessRun,
        _error: &str,
        _output: &[String],
    ) {
        if let Err(e) = self.store.save_process_run(task_id, run).await {
            warn!(task = %task_id, error = %e, "failed to persist process run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::state::create_task;
    use px_protocol::pipeline_models::{Pipeline, ProcessDefinition};
    use px_protocol::task_models::Priority;
    use std::collections::BTreeMap;

    fn task(name: &str) -> Task {
        let pipeline = Pipeline {
            name: "p".to_string(),
            description: String::new(),
            processes: vec![ProcessDefinition::new("a", "true")],
        };
        create_task(name, &pipeline, BTreeMap::new(), Priority::Low, "carol")
    }

    #[tokio::test]
    async fn test_save_update_and_query() {
        let store = InMemoryTaskStore::new();
        let mut t = task("Sample-7 alignment");
        store.save_task(&t).await.unwrap();
        assert_eq!(store.save_task(&t).await, Err(StoreError::Duplicate(t.id)));

        t.state = TaskState::Running;
        store.update_task(&t).await.unwrap();

        assert_eq!(store.tasks_by_state(TaskState::Running).await.unwrap().len(), 1);
        assert!(store.tasks_by_state(TaskState::Pending).await.unwrap().is_empty());
        assert_eq!(store.search_tasks("sample-7").await.unwrap().len(), 1);
        assert!(store.search_tasks("calling").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_task_fails() {
        let store = InMemoryTaskStore::new();
        let t = task("ghost");
        assert_eq!(store.update_task(&t).await, Err(StoreError::NotFound(t.id)));
    }

    #[tokio::test]
    async fn test_process_runs_are_replaced_by_id() {
        let store = InMemoryTaskStore::new();
        let t = task("runs");
        store.save_task(&t).await.unwrap();

        let mut run = ProcessRun::new("a", "carol");
        store.save_process_run(t.id, &run).await.unwrap();
        run.exit_value = 0;
        store.save_process_run(t.id, &run).await.unwrap();

        let stored = store.get_task(t.id).await.unwrap().unwrap();
        assert_eq!(stored.process_runs.len(), 1);
        assert_eq!(stored.process_runs[0].exit_value, 0);
    }

    #[tokio::test]
    async fn test_listener_saves_then_updates() {
        let store = Arc::new(InMemoryTaskStore::new());
        let listener = StoreWritingListener::new(store.clone());
        let mut t = task("listen");

        listener.state_changed(&t, TaskState::Pending).await;
        t.state = TaskState::Completed;
        listener.state_changed(&t, TaskState::Running).await;

        let stored = store.get_task(t.id).await.unwrap().unwrap();
        assert_eq!(stored.state, TaskState::Completed);
    }
}
