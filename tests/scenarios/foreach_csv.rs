//! Test: Foreach over CSV rows

use crate::helpers::*;
use std::sync::Arc;
use taskbook::PipelineError;

const GREET_EACH: &str = r#"
title: "Test: Foreach"
parameters:
  - name: people
    isInput: true
  - name: greetings
    isOutput: true
tasks:
  - name: greet
    title: "Greet"
    taskType: PROMPT
    content: "Greet {name} who is {age}"
    dependentParameterNames: [people]
    expectations:
      WORDS:
        max: 2
    foreach:
      formatName: CSV
      subformatName: ROW
      parameterName: people
      inputSubparameterNames: [name, age]
      outputSubparameterName: greeting
    resultingParameterName: greetings
"#;

const PEOPLE: &str = "name,age\nAda,36\nAlan,41";

/// Every row gets its own prompt and a new column with the answer
#[tokio::test]
async fn test_foreach_row_appends_column() {
    let llm = Arc::new(MockLlm::new().respond_to("Greet", &["Hello Ada", "Hello Alan"]));

    let result = run_with_llm(GREET_EACH, llm.clone(), inputs(&[("people", PEOPLE)])).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.output_parameters["greetings"],
        "name,age,greeting\nAda,36,Hello Ada\nAlan,41,Hello Alan"
    );
    assert_eq!(
        llm.prompts(),
        vec!["Greet Ada who is 36".to_string(), "Greet Alan who is 41".to_string()]
    );
}

/// Expectations are checked per row, a failing row is retried alone
#[tokio::test]
async fn test_foreach_retries_single_row() {
    let llm = Arc::new(MockLlm::new().respond_to(
        "Greet",
        &["Hello there dear Ada", "Hi Ada", "Hi Alan"],
    ));

    let result = run_with_llm(GREET_EACH, llm.clone(), inputs(&[("people", PEOPLE)])).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.output_parameters["greetings"],
        "name,age,greeting\nAda,36,Hi Ada\nAlan,41,Hi Alan"
    );

    let items: Vec<_> = result.execution_report.tasks[0]
        .attempts
        .iter()
        .map(|attempt| (attempt.item, attempt.attempt))
        .collect();
    assert_eq!(items, vec![(Some(0), 1), (Some(0), 2), (Some(1), 1)]);
}

/// The output column may not already exist
#[tokio::test]
async fn test_foreach_column_collision() {
    let yaml = GREET_EACH.replace("outputSubparameterName: greeting", "outputSubparameterName: age");
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(&yaml, llm.clone(), inputs(&[("people", PEOPLE)])).await;

    assert!(!result.is_successful);
    assert!(matches!(
        &result.errors[0],
        PipelineError::ColumnCollision { column, .. } if column == "age"
    ));
    assert_eq!(llm.calls(), 0);
}

/// A header-only table produces the header with the new column
#[tokio::test]
async fn test_foreach_empty_table() {
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(GREET_EACH, llm.clone(), inputs(&[("people", "name,age")])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["greetings"], "name,age,greeting");
    assert_eq!(llm.calls(), 0);
}
