//! Test: Failure handling - partial results, skipped tasks and bad input

use crate::helpers::*;
use std::sync::Arc;
use taskbook::core::{ParameterDefinition, Task, TaskType};
use taskbook::execution::ExecutionEngine;
use taskbook::{ExecutionOptions, ExecutionTools, Pipeline, PipelineError, TaskState};

const SPLIT: &str = r#"
title: "Test: Split"
parameters:
  - name: good
    isOutput: true
  - name: polished
    isOutput: true
tasks:
  - name: bad
    title: "Bad"
    taskType: PROMPT
    content: "Write JSON"
    format: JSON
    resultingParameterName: draft
  - name: good
    title: "Good"
    taskType: PROMPT
    content: "Say hi"
    resultingParameterName: good
  - name: polish
    title: "Polish"
    taskType: SIMPLE
    content: "Polished {draft}"
    dependentParameterNames: [draft]
    resultingParameterName: polished
"#;

/// A failed task does not stop its siblings, its dependents never start
#[tokio::test]
async fn test_failure_keeps_sibling_results() {
    let llm = Arc::new(
        MockLlm::new()
            .respond_to("Bad", &["nope", "still nope", "no"])
            .respond_to("Good", &["hi"]),
    );

    let result = run_with_llm(SPLIT, llm.clone(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        &result.errors[0],
        PipelineError::ExecutionAttemptsExhausted { task, .. } if task == "bad"
    ));

    assert_eq!(result.output_parameters.len(), 1);
    assert_eq!(result.output_parameters["good"], "hi");
    assert_eq!(llm.calls(), 4);

    assert!(matches!(task_state(&result, "bad"), TaskState::Failed { attempts: 3, .. }));
    assert!(task_state(&result, "good").is_completed());
    assert!(matches!(task_state(&result, "polish"), TaskState::Skipped { reason } if reason.contains("`{draft}`")));
    assert!(result.warnings.iter().any(|warning| warning.contains("polish")));
    assert_eq!(result.state.failed_tasks, 1);
    assert!((result.state.progress() - 2.0 / 3.0).abs() < 1e-9);
}

/// Missing inputs are reported before anything runs
#[tokio::test]
async fn test_missing_input() {
    let yaml = r#"
title: "Test: Inputs"
parameters:
  - name: topic
    isInput: true
tasks:
  - name: ask
    taskType: PROMPT
    content: "Tell me about {topic}"
    dependentParameterNames: [topic]
    resultingParameterName: answer
"#;
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert!(matches!(&result.errors[0], PipelineError::Configuration(message) if message.contains("`{topic}`")));
    assert_eq!(llm.calls(), 0);
    assert!(matches!(
        task_state(&result, "ask"),
        TaskState::Skipped { reason } if reason == "Pipeline did not start"
    ));
    assert_eq!(result.state.progress(), 0.0);
}

/// Invalid pipelines built in code are rejected by the engine as well
#[tokio::test]
async fn test_cycle_is_rejected_at_run_time() {
    let pipeline = Pipeline::new("Cycle")
        .with_parameter(ParameterDefinition::intermediate("a"))
        .with_task(Task::new("one", TaskType::Simple, "{b}", "a").with_dependencies(["b"]))
        .with_task(Task::new("two", TaskType::Simple, "{a}", "b").with_dependencies(["a"]));

    let engine = ExecutionEngine::new(ExecutionTools::new(), ExecutionOptions::default());
    let result = engine.execute_pipeline(&pipeline, inputs(&[])).await;

    assert!(!result.is_successful);
    assert!(result.errors[0].to_string().contains("Cycle detected"));
}

/// Prompt tasks without a model fail once every attempt is used
#[tokio::test]
async fn test_prompt_without_llm_tools() {
    let yaml = r#"
title: "Test: No model"
tasks:
  - name: ask
    taskType: PROMPT
    content: "Anyone there?"
    resultingParameterName: answer
"#;

    let result = run_yaml(yaml, ExecutionTools::new(), ExecutionOptions::default(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert!(result.errors[0].to_string().contains("No LLM tools are configured"));
}
