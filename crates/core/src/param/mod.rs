//! Process parameters and their command-line rendering.
//!
//! This module provides:
//! - `ParamMap`: ordered parameter values validated against a process's
//!   declared parameters
//! - `OptionRenderer`: POSIX and key=value rendering of named options, and
//!   the matching parser

pub mod error;
pub mod format;
pub mod map;

pub use error::{ParamError, ParamResult};
pub use format::OptionRenderer;
pub use map::ParamMap;
