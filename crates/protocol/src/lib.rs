//! # px-protocol
//!
//! Data models shared between the px engine and its clients.
//!
//! ## Modules
//!
//! - [`pipeline_models`]: Pipeline, process and parameter declarations
//! - [`task_models`]: Tasks, process runs and their states
//! - [`ipc`]: Lifecycle events emitted by the engine
//!
//! All types derive `TS` so clients can generate matching bindings.

pub mod ipc;
pub mod pipeline_models;
pub mod task_models;

pub use ipc::*;
pub use pipeline_models::*;
pub use task_models::*;
