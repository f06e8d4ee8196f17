//! Assertion helpers over recorded event sequences.

#![allow(dead_code)]

use px_protocol::ipc::Event;
use px_protocol::task_models::TaskState;
use tokio::sync::mpsc::Receiver;

/// Drain every event still buffered in `rx`.
pub fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The sequence of states the task moved into.
pub fn state_sequence(events: &[Event]) -> Vec<TaskState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::TaskStateChanged { task, .. } => Some(task.state),
            _ => None,
        })
        .collect()
}

pub fn count_process_started(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::ProcessStarted { .. }))
        .count()
}

pub fn count_process_failed(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::ProcessFailed { .. }))
        .count()
}

/// Check the lifecycle invariants every task run must satisfy.
///
/// 1. The first state change is into Running (or straight to Aborted)
/// 2. Exactly one terminal state change, and it is the last one
/// 3. Every ProcessStarted precedes the terminal state change
pub fn assert_lifecycle(events: &[Event]) {
    let states = state_sequence(events);
    assert!(!states.is_empty(), "no state changes recorded");
    assert!(
        matches!(states[0], TaskState::Running | TaskState::Aborted),
        "first state change should enter Running, got {:?}",
        states[0]
    );
    let terminal: Vec<_> = states.iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "expected one terminal state, got {states:?}");
    assert!(states.last().is_some_and(TaskState::is_terminal));

    let terminal_at = events
        .iter()
        .position(|e| matches!(e, Event::TaskStateChanged { task, .. } if task.state.is_terminal()))
        .unwrap_or(events.len());
    let last_start = events
        .iter()
        .rposition(|e| matches!(e, Event::ProcessStarted { .. }));
    if let Some(last_start) = last_start {
        assert!(last_start < terminal_at, "process started after the task finished");
    }
}
