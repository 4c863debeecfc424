//! Test: Template rendering across task types

use crate::helpers::*;
use std::sync::Arc;
use taskbook::{ExecutionOptions, ExecutionTools, PipelineError};

/// Multi-line values keep the column prefix of their placeholder
#[tokio::test]
async fn test_multiline_value_is_indented() {
    let yaml = r#"
title: "Test: Indent"
parameters:
  - name: list
    isInput: true
tasks:
  - name: quote
    taskType: SIMPLE
    content: "Items:\n  > {list}\nDone"
    dependentParameterNames: [list]
    resultingParameterName: quoted
"#;

    let result = run_with_llm(yaml, Arc::new(MockLlm::new()), inputs(&[("list", "a\nb")])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["quoted"], "Items:\n  > a\n  > b\nDone");
}

/// JSON braces in a prompt are sent as written
#[tokio::test]
async fn test_json_braces_reach_the_model() {
    let yaml = r#"
title: "Test: Braces"
parameters:
  - name: city
    isInput: true
tasks:
  - name: weather
    title: "Weather"
    taskType: PROMPT
    content: 'Answer as {"city": "{city}", "sunny": true}'
    dependentParameterNames: [city]
    resultingParameterName: weather
"#;
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(yaml, llm.clone(), inputs(&[("city", "Prague")])).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        llm.prompts(),
        vec![r#"Answer as {"city": "Prague", "sunny": true}"#.to_string()]
    );
}

/// `{currentDate}` is an ISO timestamp in UTC
#[tokio::test]
async fn test_current_date_is_available() {
    let yaml = r#"
title: "Test: Date"
tasks:
  - name: stamp
    taskType: SIMPLE
    content: "Today: {currentDate}"
    resultingParameterName: stamp
"#;

    let result = run_with_llm(yaml, Arc::new(MockLlm::new()), inputs(&[])).await;

    assert_pipeline_completed(&result);
    let stamp = result.output_parameters["stamp"].strip_prefix("Today: ").unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    assert!(stamp.ends_with('Z'));
}

/// Reserved parameters without a value fail without retrying
#[tokio::test]
async fn test_missing_reserved_value_fails_fast() {
    let yaml = r#"
title: "Test: Context"
tasks:
  - name: ctx
    title: "Ctx"
    taskType: PROMPT
    content: "Given {context}, answer"
    resultingParameterName: answer
"#;
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert!(matches!(&result.errors[0], PipelineError::Unexpected(message) if message.contains("`{context}`")));
    assert_eq!(result.execution_report.tasks[0].attempts.len(), 1);
    assert_eq!(llm.calls(), 0);
}

/// Scripts get their source untouched and see only their dependencies
#[tokio::test]
async fn test_script_receives_raw_source() {
    let yaml = r#"
title: "Test: Script"
parameters:
  - name: topic
    isInput: true
  - name: other
    isInput: true
tasks:
  - name: run
    taskType: SCRIPT
    contentLanguage: bash
    content: "echo {topic}"
    dependentParameterNames: [topic]
    resultingParameterName: output
"#;
    let script = Arc::new(MockScript::default());

    let result = run_yaml(
        yaml,
        ExecutionTools::new().with_script(script.clone()),
        ExecutionOptions::default(),
        inputs(&[("topic", "cats"), ("other", "dogs")]),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["output"], "topic=cats");

    let seen = script.seen.lock().unwrap();
    assert_eq!(seen[0].0, "echo {topic}");
    assert_eq!(seen[0].1.len(), 1);
}

/// Dialogs show the rendered description and offer the rendered content
#[tokio::test]
async fn test_dialog_offers_rendered_default() {
    let yaml = r#"
title: "Test: Dialog"
parameters:
  - name: topic
    isInput: true
tasks:
  - name: opinion
    title: "Opinion"
    description: "What do you think about {topic}?"
    taskType: DIALOG
    content: "{topic} is great"
    dependentParameterNames: [topic]
    resultingParameterName: opinion
"#;
    let dialog = Arc::new(MockDialog::accepting_default());

    let result = run_yaml(
        yaml,
        ExecutionTools::new().with_user_interface(dialog.clone()),
        ExecutionOptions::default(),
        inputs(&[("topic", "cats")]),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["opinion"], "cats is great");

    let asked = dialog.asked.lock().unwrap();
    assert_eq!(asked[0].prompt_title, "Opinion");
    assert_eq!(asked[0].prompt_message, "What do you think about cats?");
}

/// The user's answer wins over the default
#[tokio::test]
async fn test_dialog_answer_is_the_result() {
    let yaml = r#"
title: "Test: Dialog answer"
tasks:
  - name: name
    taskType: DIALOG
    content: "Anonymous"
    resultingParameterName: name
"#;

    let result = run_yaml(
        yaml,
        ExecutionTools::new().with_user_interface(Arc::new(MockDialog::answering("Ada"))),
        ExecutionOptions::default(),
        inputs(&[]),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["name"], "Ada");
}
