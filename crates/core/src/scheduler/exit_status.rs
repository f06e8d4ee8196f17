//! Backend-independent exit statuses and wait targets.

use serde::{Deserialize, Serialize};

/// The job outcome a wait condition waits for.
///
/// Each scheduler maps these to its own dependency token.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatusType {
    CompletedSuccess,
    CompletedFailed,
    CompletedAny,
}

/// What a wait condition refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// A job name or name pattern.
    Name(String),
    /// Every listed job must reach the status.
    JobIds(Vec<u32>),
}
