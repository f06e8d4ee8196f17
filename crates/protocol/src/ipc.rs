//! Lifecycle events emitted by the task engine.
//!
//! Events flow one way, from the engine to whoever holds the receiving end
//! of the channel: the command-line front end, the listener hub that feeds
//! persistence and notification collaborators, or tests.
//!
//! Uses tagged enum serialization:
//! ```json
//! {
//!   "type": "taskStateChanged",
//!   "payload": {
//!     "task": { "id": "uuid-here", "state": "RUNNING", "...": "..." },
//!     "previous": "PENDING"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::task_models::{ProcessRun, Task, TaskState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// The task changed state. Carries a snapshot taken after the change.
    TaskStateChanged { task: Task, previous: TaskState },

    /// A process run began.
    ProcessStarted {
        #[ts(type = "string")]
        task_id: Uuid,
        step_index: usize,
        run: ProcessRun,
    },

    /// A process run finished with exit code 0.
    ProcessEnded {
        #[ts(type = "string")]
        task_id: Uuid,
        step_index: usize,
        run: ProcessRun,
    },

    /// A process run failed. `output` holds the captured lines.
    ProcessFailed {
        #[ts(type = "string")]
        task_id: Uuid,
        step_index: usize,
        run: ProcessRun,
        error: String,
        output: Vec<String>,
    },

    /// Free-form progress output from a task.
    TaskLog {
        #[ts(type = "string")]
        task_id: Uuid,
        content: String,
    },
}

impl Event {
    /// The task this event belongs to.
    pub fn task_id(&self) -> Uuid {
        match self {
            Event::TaskStateChanged { task, .. } => task.id,
            Event::ProcessStarted { task_id, .. }
            | Event::ProcessEnded { task_id, .. }
            | Event::ProcessFailed { task_id, .. }
            | Event::TaskLog { task_id, .. } => *task_id,
        }
    }
}
