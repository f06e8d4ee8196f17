//! Process command assembly and execution.

pub mod command;
pub mod service;

pub use command::ProcessCommand;
pub use service::{JobSpec, ProcessService};
