use px_protocol::*;
use std::collections::BTreeMap;

#[test]
fn test_pipeline_deserialization_from_yaml() {
    let yaml_str = r#"
name: align-reads
description: Index then align
processes:
  - name: index
    executable: bowtie2-build
    parameters:
      - name: reference
        index: 0
        validator: path
      - name: prefix
        index: 1
  - name: align
    executable: bowtie2
    threads: 8
    memory-mb: 16000
    parameters:
      - name: prefix
        short: x
      - name: reads
        short: U
        validator: path
      - name: very-sensitive
        long: very-sensitive
        flag: true
        optional: true
        validator: "off"
      - name: sam
        redirect: true
        validator: path
"#;

    let pipeline: Pipeline = serde_yaml::from_str(yaml_str).expect("Failed to deserialize Pipeline");

    assert_eq!(pipeline.name, "align-reads");
    assert_eq!(pipeline.processes.len(), 2);
    assert_eq!(pipeline.processes[0].parameters[0].index, Some(0));
    assert_eq!(pipeline.processes[0].parameters[0].validator, ArgValidator::Path);
    assert_eq!(pipeline.processes[0].format, CommandLineFormat::Posix);

    let align = &pipeline.processes[1];
    assert_eq!(align.threads, 8);
    assert_eq!(align.memory_mb, 16000);
    assert_eq!(align.parameters[0].short_name.as_deref(), Some("x"));
    assert!(align.parameters[2].flag);
    assert!(align.parameters[3].redirect);

    // "prefix" is declared by both processes but listed once
    assert_eq!(pipeline.all_parameters().len(), 5);
}

#[test]
fn test_task_state_serialization() {
    let json = serde_json::to_value(TaskState::Running).expect("Failed to serialize TaskState");
    assert_eq!(json, "RUNNING");

    let deserialized: TaskState =
        serde_json::from_value(serde_json::json!("ABORTED")).expect("Failed to deserialize TaskState");
    assert_eq!(deserialized, TaskState::Aborted);
    assert!(deserialized.is_terminal());
    assert!(!TaskState::Pending.is_terminal());
}

#[test]
fn test_task_serialization() {
    let mut parameter_values = BTreeMap::new();
    parameter_values.insert("reads".to_string(), "/data/sample.fq".to_string());

    let task = Task {
        id: uuid::Uuid::new_v4(),
        name: "sample-1".to_string(),
        pipeline_name: "align-reads".to_string(),
        parameter_values,
        priority: Priority::High,
        submitter: "alice".to_string(),
        creation_date: chrono::Utc::now(),
        start_date: None,
        completion_date: None,
        current_execution_index: 0,
        state: TaskState::Pending,
        process_runs: vec![ProcessRun::new("index", "alice")],
        failure: None,
    };

    let json = serde_json::to_string(&task).expect("Failed to serialize Task");
    let deserialized: Task = serde_json::from_str(&json).expect("Failed to deserialize Task");

    assert_eq!(deserialized, task);
    assert_eq!(deserialized.process_runs[0].exit_value, -1);
}

#[test]
fn test_failure_kind_serialization() {
    let json = serde_json::to_value(FailureKind::ExternalDeletion).expect("Failed to serialize FailureKind");
    assert_eq!(json, "external-deletion");
}

#[test]
fn test_event_enum_serialization() {
    let task_id = uuid::Uuid::new_v4();
    let event = Event::ProcessStarted {
        task_id,
        step_index: 1,
        run: ProcessRun::new("align", "alice"),
    };

    let json = serde_json::to_value(&event).expect("Failed to serialize Event");
    assert_eq!(json["type"], "processStarted");
    assert_eq!(json["payload"]["step_index"], 1);

    let deserialized: Event = serde_json::from_value(json).expect("Failed to deserialize Event");
    assert_eq!(deserialized.task_id(), task_id);

    let log = Event::TaskLog {
        task_id,
        content: "submitted".to_string(),
    };
    let json = serde_json::to_value(&log).expect("Failed to serialize Event");
    assert_eq!(json["type"], "taskLog");
}
