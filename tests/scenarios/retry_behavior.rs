//! Test: Retry behavior - attempts, expectations and formats

use crate::helpers::*;
use std::sync::Arc;
use taskbook::{PipelineError, TaskState};

/// A task whose first answers break expectations succeeds on a later attempt
#[tokio::test]
async fn test_retry_until_expectations_pass() {
    let yaml = r#"
title: "Test: Retry"
parameters:
  - name: slogan
    isOutput: true
tasks:
  - name: slogan
    title: "Slogan"
    taskType: PROMPT
    content: "Write a slogan"
    expectations:
      WORDS:
        min: 2
        max: 4
    resultingParameterName: slogan
"#;
    let llm = Arc::new(MockLlm::new().respond_to(
        "Slogan",
        &["Buy", "Buy our product today, it is great", "Just do it"],
    ));

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["slogan"], "Just do it");
    assert_eq!(llm.calls(), 3);

    let report = &result.execution_report.tasks[0];
    assert_eq!(report.attempts.len(), 3);
    assert!(report.attempts[0].error.is_some());
    assert!(report.attempts[1].error.is_some());
    assert_eq!(report.attempts[2].result.as_deref(), Some("Just do it"));
    assert!(matches!(report.state, TaskState::Completed { attempts: 3, .. }));
}

/// JSON format heals fenced answers
#[tokio::test]
async fn test_json_format_is_extracted() {
    let yaml = r#"
title: "Test: JSON"
parameters:
  - name: data
    isOutput: true
tasks:
  - name: data
    title: "Data"
    taskType: PROMPT
    content: "Give me data"
    format: JSON
    resultingParameterName: data
"#;
    let llm = Arc::new(MockLlm::new().respond_to(
        "Data",
        &["Sure!\n```json\n{\"answer\": 42}\n```\nAnything else?"],
    ));

    let result = run_with_llm(yaml, llm, inputs(&[])).await;

    assert_pipeline_completed(&result);
    let value: serde_json::Value = serde_json::from_str(&result.output_parameters["data"]).unwrap();
    assert_eq!(value["answer"], 42);
}

/// Postprocessing runs before the expectations are checked
#[tokio::test]
async fn test_postprocessing_before_expectations() {
    let yaml = r#"
title: "Test: Postprocessing"
parameters:
  - name: word
    isOutput: true
tasks:
  - name: word
    title: "Word"
    taskType: PROMPT
    content: "One word please"
    postprocessingFunctionNames: [trim, uppercase]
    expectations:
      CHARACTERS:
        max: 5
    resultingParameterName: word
"#;
    let llm = Arc::new(MockLlm::new().respond_to("Word", &["   hello   "]));

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["word"], "HELLO");
    assert_eq!(llm.calls(), 1);
}

/// Exhausted attempts list every attempt's error
#[tokio::test]
async fn test_attempts_exhausted_lists_errors() {
    let yaml = r#"
title: "Test: Exhausted"
tasks:
  - name: haiku
    title: "Haiku"
    taskType: PROMPT
    content: "Write a haiku"
    expectations:
      LINES:
        min: 3
    resultingParameterName: haiku
"#;
    let llm = Arc::new(MockLlm::new().respond_to("Haiku", &["one", "two", "three"]));

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert_eq!(llm.calls(), 3);
    match &result.errors[0] {
        PipelineError::ExecutionAttemptsExhausted { task, attempts, errors } => {
            assert_eq!(task, "haiku");
            assert_eq!(*attempts, 3);
            assert_eq!(errors.len(), 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
