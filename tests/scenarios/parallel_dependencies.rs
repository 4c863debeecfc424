//! Test: Parallel dependencies - independent tasks run together, dependents wait

use crate::helpers::*;
use std::sync::Arc;
use std::time::Duration;
use taskbook::{ExecutionOptions, ExecutionTools, TaskState};

const FAN_IN: &str = r#"
title: "Test: Fan in"
parameters:
  - name: a
  - name: b
  - name: c
    isOutput: true
tasks:
  - name: combine
    taskType: SIMPLE
    content: "{a} + {b}"
    dependentParameterNames: [a, b]
    resultingParameterName: c
  - name: first
    taskType: PROMPT
    content: "alpha"
    resultingParameterName: a
  - name: second
    taskType: PROMPT
    content: "beta"
    resultingParameterName: b
"#;

/// C only starts once both A and B are resolved, A and B overlap
#[tokio::test]
async fn test_independent_tasks_run_in_parallel() {
    let llm = Arc::new(MockLlm::new().with_delay(Duration::from_millis(50)));

    let result = run_with_llm(FAN_IN, llm.clone(), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters.len(), 1);
    assert_eq!(result.output_parameters["c"], "echo: alpha + echo: beta");
    assert_eq!(llm.calls(), 2);
    assert_eq!(llm.max_in_flight(), 2);
    assert_eq!(result.state.completed_tasks, 3);
}

/// With a parallel limit of one, no two model calls overlap
#[tokio::test]
async fn test_parallel_limit_is_respected() {
    let llm = Arc::new(MockLlm::new().with_delay(Duration::from_millis(20)));

    let result = run_yaml(
        FAN_IN,
        ExecutionTools::new().with_llm(llm.clone()),
        ExecutionOptions::default().with_max_parallel_count(1),
        inputs(&[]),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(llm.max_in_flight(), 1);
    assert_eq!(result.output_parameters["c"], "echo: alpha + echo: beta");
}

/// Dependents start after their producers finished
#[tokio::test]
async fn test_dependent_starts_after_producers() {
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(FAN_IN, llm, inputs(&[])).await;

    let finished_at = |name: &str| match task_state(&result, name) {
        TaskState::Completed { completed_at, .. } => *completed_at,
        other => panic!("{} did not complete: {:?}", name, other),
    };
    let started_at = |name: &str| match task_state(&result, name) {
        TaskState::Completed { started_at, .. } => *started_at,
        other => panic!("{} did not complete: {:?}", name, other),
    };

    assert!(started_at("combine") >= finished_at("first"));
    assert!(started_at("combine") >= finished_at("second"));
}

/// Without declared outputs every parameter is returned
#[tokio::test]
async fn test_all_parameters_returned_without_outputs() {
    let yaml = r#"
title: "No outputs"
parameters:
  - name: topic
    isInput: true
tasks:
  - name: shout
    taskType: SIMPLE
    content: "{topic}!"
    dependentParameterNames: [topic]
    resultingParameterName: shouted
"#;

    let result = run_with_llm(yaml, Arc::new(MockLlm::new()), inputs(&[("topic", "hey")])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters.len(), 2);
    assert_eq!(result.output_parameters["topic"], "hey");
    assert_eq!(result.output_parameters["shouted"], "hey!");
}
