//! Fixtures for pipelines, tasks and project directories.

#![allow(dead_code)]

use px_core::task::state::create_task;
use px_protocol::pipeline_models::{Pipeline, ProcessDefinition};
use px_protocol::task_models::{Priority, Task};
use std::collections::BTreeMap;
use tempfile::TempDir;

/// A pipeline whose steps are plain shell executables.
pub fn shell_pipeline(name: &str, steps: &[(&str, &str)]) -> Pipeline {
    Pipeline {
        name: name.to_string(),
        description: format!("{name} test pipeline"),
        processes: steps
            .iter()
            .map(|(step, exe)| ProcessDefinition::new(*step, *exe))
            .collect(),
    }
}

/// Three steps; the second prints a line and exits with code 3.
pub fn failing_in_the_middle() -> Pipeline {
    shell_pipeline(
        "three-steps",
        &[
            ("prepare", "true"),
            ("fail", "echo step-two-failed; exit 3"),
            ("never", "true"),
        ],
    )
}

pub fn task_for(pipeline: &Pipeline, values: BTreeMap<String, String>) -> Task {
    create_task(
        format!("{}-task", pipeline.name),
        pipeline,
        values,
        Priority::Medium,
        "tester",
    )
}

pub const ALIGN_PIPELINE: &str = r#"name: align-reads
description: Index then align
processes:
  - name: index
    executable: echo
    parameters:
      - name: reference
        index: 0
        validator: path
  - name: align
    executable: echo
    threads: 4
    memory-mb: 8000
    parameters:
      - name: reads
        index: 0
        validator: path
"#;

/// A temporary project with a `.px/` tree holding `ALIGN_PIPELINE`.
///
/// Returns a TempDir that must be kept alive for the test duration.
pub fn create_test_project(config_toml: &str) -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let px_dir = temp_dir.path().join(".px");
    std::fs::create_dir_all(px_dir.join("pipelines"))?;
    std::fs::write(px_dir.join("config.toml"), config_toml)?;
    std::fs::write(
        px_dir.join("processes.toml"),
        "[pre_commands]\nindex = \"echo preparing-index\"\n",
    )?;
    std::fs::write(px_dir.join("pipelines/align.yaml"), ALIGN_PIPELINE)?;
    Ok(temp_dir)
}
