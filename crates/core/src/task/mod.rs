//! Tasks: a pipeline bound to parameter values, driven to a terminal state.
//!
//! - [`state`]: the task state machine and the events each transition emits
//! - [`driver`]: runs one task through its pipeline
//! - [`manager`]: runs many tasks concurrently and tracks their snapshots
//! - [`listener`]: fans events out to persistence and notification hooks
//! - [`store`]: task persistence behind a trait

pub mod driver;
pub mod listener;
pub mod manager;
pub mod state;
pub mod store;

pub use driver::TaskDriver;
pub use listener::{ListenerHub, TaskListener};
pub use manager::{Submission, TaskManager};
pub use store::{InMemoryTaskStore, StoreError, StoreWritingListener, TaskStore};
