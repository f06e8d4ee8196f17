//! Shared helpers for the px-core integration tests.
//!
//! - Fixtures: pipelines, tasks and `.px/` project trees
//! - Assertions over recorded events
//! - A shell-backed scheduler that writes LSF-style job reports locally

pub mod assertions;
pub mod fixtures;
pub mod shell_scheduler;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use shell_scheduler::*;
