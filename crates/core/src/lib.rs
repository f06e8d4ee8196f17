//! # px-core
//!
//! Execution and scheduling layer for px pipelines.
//!
//! This crate provides:
//! - Parameter validation and command-line rendering
//! - Batch scheduler command builders for LSF, PBS and OGE
//! - Localities that run commands and wait on scheduled jobs
//! - A monitor that detects job completion from scheduler output files
//! - The task state machine, driver and manager
//! - Configuration loading from the `.px/` directory
//!
//! ## Modules
//!
//! - [`param`]: Parameter maps and option rendering
//! - [`scheduler`]: Scheduler trait and backends
//! - [`monitor`]: Job completion monitoring
//! - [`locality`]: Where commands run
//! - [`context`]: Execution context passed to every step
//! - [`process`]: Process commands and the process service
//! - [`task`]: Task state machine, driver, manager, listeners and store
//! - [`config`]: Configuration loading and management

pub mod config;
pub mod context;
pub mod locality;
pub mod monitor;
pub mod param;
pub mod process;
pub mod scheduler;
pub mod task;
