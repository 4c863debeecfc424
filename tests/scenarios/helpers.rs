//! Mock tools and assertion helpers shared by the scenarios

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskbook::core::ScriptLanguage;
use taskbook::execution::{prepare_pipeline, ExecutionEngine, PipelineExecutorResult};
use taskbook::tools::{
    DialogOptions, EmbeddingResult, Prompt, PromptResult, ScriptExecutionTools, ToolError,
    UserInterfaceTools,
};
use taskbook::{ExecutionOptions, ExecutionTools, LlmExecutionTools, Pipeline, TaskState};

/// Mock model answering from per-title scripts, echoing once a script runs out
#[derive(Default)]
pub struct MockLlm {
    scripts: HashMap<String, Vec<String>>,
    served: Mutex<HashMap<String, usize>>,
    embedding: Option<Vec<f64>>,
    simulate_delay: Option<Duration>,
    calls: AtomicUsize,
    embedding_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for prompts titled `title`, in order
    pub fn respond_to(mut self, title: &str, responses: &[&str]) -> Self {
        self.scripts.insert(
            title.to_string(),
            responses.iter().map(|response| response.to_string()).collect(),
        );
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f64>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Add artificial delay to simulate a slow model
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulate_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }

    /// Highest number of chat calls that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmExecutionTools for MockLlm {
    async fn call_chat_model(&self, prompt: &Prompt) -> Result<PromptResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.content.clone());

        if let Some(delay) = self.simulate_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut served = self.served.lock().unwrap();
            let index = served.entry(prompt.title.clone()).or_insert(0);
            let response = self
                .scripts
                .get(&prompt.title)
                .and_then(|responses| responses.get(*index))
                .cloned();
            *index += 1;
            response
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let content = scripted.unwrap_or_else(|| format!("echo: {}", prompt.content));
        Ok(PromptResult::new(content, "mock-model"))
    }

    async fn call_embedding_model(&self, _prompt: &Prompt) -> Result<EmbeddingResult, ToolError> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        match &self.embedding {
            Some(embedding) => Ok(EmbeddingResult {
                content: embedding.clone(),
                model_name: "mock-embedding".to_string(),
            }),
            None => Err(ToolError::Unsupported("Embedding model".to_string())),
        }
    }
}

/// Mock script runner that records what it was given
#[derive(Default)]
pub struct MockScript {
    pub seen: Mutex<Vec<(String, HashMap<String, String>)>>,
}

#[async_trait]
impl ScriptExecutionTools for MockScript {
    async fn execute(
        &self,
        _language: ScriptLanguage,
        script: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        self.seen
            .lock()
            .unwrap()
            .push((script.to_string(), parameters.clone()));

        let mut names: Vec<_> = parameters.keys().cloned().collect();
        names.sort();
        Ok(names
            .iter()
            .map(|name| format!("{}={}", name, parameters[name]))
            .collect::<Vec<_>>()
            .join(";"))
    }
}

/// Mock user who always gives the same answer, or accepts the default
pub struct MockDialog {
    answer: Option<String>,
    pub asked: Mutex<Vec<DialogOptions>>,
}

impl MockDialog {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting_default() -> Self {
        Self {
            answer: None,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl UserInterfaceTools for MockDialog {
    async fn prompt_dialog(&self, options: &DialogOptions) -> Result<String, ToolError> {
        self.asked.lock().unwrap().push(options.clone());
        self.answer
            .clone()
            .or_else(|| options.default_value.clone())
            .ok_or_else(|| ToolError::Internal("No answer".to_string()))
    }
}

pub fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Load, prepare and run a YAML pipeline
pub async fn run_yaml(
    yaml: &str,
    tools: ExecutionTools,
    options: ExecutionOptions,
    input_parameters: HashMap<String, String>,
) -> PipelineExecutorResult {
    let pipeline = Pipeline::from_yaml(yaml).unwrap();
    let prepared = prepare_pipeline(&pipeline, &options).await.unwrap();
    let engine = ExecutionEngine::new(tools, options);
    engine.execute_pipeline(&prepared, input_parameters).await
}

/// Run a YAML pipeline with only a mock model
pub async fn run_with_llm(
    yaml: &str,
    llm: Arc<MockLlm>,
    input_parameters: HashMap<String, String>,
) -> PipelineExecutorResult {
    run_yaml(
        yaml,
        ExecutionTools::new().with_llm(llm),
        ExecutionOptions::default(),
        input_parameters,
    )
    .await
}

pub fn assert_pipeline_completed(result: &PipelineExecutorResult) {
    assert!(
        result.is_successful,
        "Pipeline failed with errors: {:?}",
        result.errors
    );
}

pub fn task_state<'a>(result: &'a PipelineExecutorResult, task_name: &str) -> &'a TaskState {
    &result
        .execution_report
        .tasks
        .iter()
        .find(|task| task.task_name == task_name)
        .unwrap_or_else(|| panic!("Task {} not in report", task_name))
        .state
}
