//! Test: Knowledge injection - retrieved pieces follow the task content

use crate::helpers::*;
use std::sync::Arc;
use taskbook::execution::prepare_pipeline;
use taskbook::{ExecutionOptions, Pipeline};

const WITH_KNOWLEDGE: &str = r#"
title: "Test: Knowledge"
parameters:
  - name: answer
    isOutput: true
tasks:
  - name: answer
    title: "Answer"
    taskType: PROMPT
    content: "What do cats do?"
    resultingParameterName: answer
knowledgePieces:
  - content: "Dogs bark"
    index:
      - modelName: "text-embedding"
        position: [0.0, 1.0]
  - content: "Cats purr"
    index:
      - modelName: "text-embedding"
        position: [1.0, 0.0]
"#;

/// The prepared task carries the knowledge section ranked by relevance
#[tokio::test]
async fn test_knowledge_is_appended_to_prompt() {
    let llm = Arc::new(MockLlm::new().with_embedding(vec![1.0, 0.0]));

    let result = run_with_llm(WITH_KNOWLEDGE, llm.clone(), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(llm.embedding_calls(), 1);
    assert_eq!(
        llm.prompts(),
        vec!["What do cats do?\n\n## Knowledge\n\n- Cats purr\n- Dogs bark".to_string()]
    );
}

/// Without an embedding model the task can not get its knowledge
#[tokio::test]
async fn test_knowledge_needs_embedding_model() {
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(WITH_KNOWLEDGE, llm.clone(), inputs(&[])).await;

    assert!(!result.is_successful);
    assert_eq!(llm.calls(), 0);
    assert_eq!(llm.embedding_calls(), 3);
}

/// Pieces without embeddings yield the placeholder text
#[tokio::test]
async fn test_unindexed_knowledge() {
    let yaml = r#"
title: "Test: Unindexed"
tasks:
  - name: hi
    title: "Hi"
    taskType: PROMPT
    content: "Hi"
    resultingParameterName: greeting
knowledgePieces:
  - content: "Nobody embedded me"
"#;
    let llm = Arc::new(MockLlm::new());

    let result = run_with_llm(yaml, llm.clone(), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.output_parameters["greeting"],
        "echo: Hi\n\n## Knowledge\n\nNo knowledge pieces found"
    );
    assert_eq!(llm.embedding_calls(), 0);
}

/// Tasks that use `{knowledge}` themselves are not wrapped again
#[tokio::test]
async fn test_explicit_knowledge_is_not_duplicated() {
    let yaml = r#"
title: "Test: Explicit"
tasks:
  - name: facts
    title: "Facts"
    taskType: SIMPLE
    content: "Facts:\n{knowledge}"
    dependentParameterNames: [knowledge]
    resultingParameterName: facts
knowledgePieces:
  - content: "Nobody embedded me"
"#;
    let pipeline = Pipeline::from_yaml(yaml).unwrap();
    let prepared = prepare_pipeline(&pipeline, &ExecutionOptions::default())
        .await
        .unwrap();
    assert_eq!(prepared.tasks[0].prepared_content, None);

    let result = run_with_llm(yaml, Arc::new(MockLlm::new()), inputs(&[])).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output_parameters["facts"], "Facts:\nNo knowledge pieces found");
}
