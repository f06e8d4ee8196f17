//! Completion detection for jobs submitted to a batch scheduler.
//!
//! Batch schedulers do not push completion notifications. The monitor polls
//! the output file a scheduler writes for a job, classifies each new line
//! of banner text and raises events to its listeners.
//!
//! This module provides:
//! - `LineClassifier`: per-backend classification of scheduler banner lines
//! - `ProcessMonitor`: the polling loop, listener fan-out and the blocking
//!   `wait_for_exit_code`

pub mod classifier;
pub mod error;
pub mod process_monitor;

pub use classifier::{LineClass, LineClassifier, LsfBannerClassifier};
pub use error::{MonitorError, MonitorResult};
pub use process_monitor::{MonitorEvent, MonitorSubscription, ProcessMonitor};
