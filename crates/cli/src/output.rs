//! Terminal rendering of task lifecycle events.

use colored::{ColoredString, Colorize};
use px_protocol::ipc::Event;
use px_protocol::task_models::{Task, TaskState};

fn state_label(state: TaskState) -> ColoredString {
    let label = format!("{state:?}").to_uppercase();
    match state {
        TaskState::Pending => label.normal(),
        TaskState::Running => label.cyan(),
        TaskState::Completed => label.green().bold(),
        TaskState::Aborted => label.yellow().bold(),
        TaskState::Failed => label.red().bold(),
    }
}

/// One event as a JSON line.
pub fn json_line(event: &Event) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

/// One event as human-readable lines.
pub fn render(event: &Event) -> Vec<String> {
    match event {
        Event::TaskStateChanged { task, previous } => vec![format!(
            "{} task {} {} -> {}",
            "●".bold(),
            task.name.bold(),
            state_label(*previous),
            state_label(task.state)
        )],
        Event::ProcessStarted {
            step_index, run, ..
        } => vec![format!("{} [{step_index}] {}", "▶".cyan(), run.process_name)],
        Event::ProcessEnded {
            step_index, run, ..
        } => {
            let job = run
                .job_id
                .map(|id| format!(" (job {id})"))
                .unwrap_or_default();
            vec![format!(
                "{} [{step_index}] {}{}",
                "✔".green(),
                run.process_name,
                job.dimmed()
            )]
        }
        Event::ProcessFailed {
            step_index,
            run,
            error,
            output,
            ..
        } => {
            let mut lines = vec![format!(
                "{} [{step_index}] {}: {}",
                "✖".red(),
                run.process_name,
                error.red()
            )];
            lines.extend(output.iter().map(|line| format!("    {}", line.dimmed())));
            lines
        }
        Event::TaskLog { content, .. } => vec![format!("  {}", content.dimmed())],
    }
}

/// Closing summary for a finished task.
pub fn summary(task: &Task) -> Vec<String> {
    let mut lines = vec![format!(
        "Task {} finished {} ({} process run(s))",
        task.name.bold(),
        state_label(task.state),
        task.process_runs.len()
    )];
    if let Some(failure) = &task.failure {
        lines.push(format!(
            "  step {} ({}) failed: {:?}, exit code {}",
            failure.step_index, failure.process_name, failure.kind, failure.exit_code
        ));
        if let Some(host) = &failure.execution_host {
            lines.push(format!("  host: {host}"));
        }
        lines.push(format!("  {}", failure.message));
    }
    lines
}
