//! Task executor - runs one task through jokers, attempts and checks

use crate::core::config::ExecutionOptions;
use crate::core::error::PipelineError;
use crate::core::pipeline::Pipeline;
use crate::core::task::{ForeachDefinition, ModelVariant, Task, TaskType};
use crate::execution::reserved::resolve_reserved_parameters;
use crate::formats::{FormatRegistry, SubvalueFuture, SubvalueParameters};
use crate::postprocessing::PostprocessingRegistry;
use crate::templates::render_template;
use crate::tools::{DialogOptions, ExecutionTools, Prompt, ToolError};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One joker check or execution attempt of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    /// 1-based attempt number, 0 for joker checks
    pub attempt: usize,

    /// Joker parameter that was checked instead of executing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joker: Option<String>,

    /// Sub-value index for foreach tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type AttemptLog = Arc<Mutex<Vec<AttemptReport>>>;

/// Result of running one task
#[derive(Debug)]
pub struct TaskOutcome {
    pub result: Result<String, PipelineError>,
    pub attempts: Vec<AttemptReport>,
}

/// Executes single tasks with the configured tools and registries
#[derive(Clone)]
pub struct TaskExecutor {
    tools: ExecutionTools,
    formats: Arc<FormatRegistry>,
    postprocessing: Arc<PostprocessingRegistry>,
    options: ExecutionOptions,
}

impl TaskExecutor {
    pub fn new(
        tools: ExecutionTools,
        formats: Arc<FormatRegistry>,
        postprocessing: Arc<PostprocessingRegistry>,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            tools,
            formats,
            postprocessing,
            options,
        }
    }

    /// Run the task against a snapshot of the resolved parameters
    pub async fn execute_task(
        &self,
        pipeline: Arc<Pipeline>,
        task: Arc<Task>,
        parameters: HashMap<String, String>,
    ) -> TaskOutcome {
        info!("Executing task: {}", task.name);
        let log: AttemptLog = Arc::new(Mutex::new(Vec::new()));

        let result = match self.try_jokers(&task, &parameters, &log).await {
            Some(value) => Ok(value),
            None => match task.foreach.clone() {
                Some(foreach) => {
                    self.execute_foreach(pipeline, task.clone(), parameters, foreach, log.clone())
                        .await
                }
                None => {
                    self.execute_attempts(pipeline, task.clone(), parameters, log.clone(), None)
                        .await
                }
            },
        };

        let attempts = std::mem::take(&mut *log.lock().await);
        TaskOutcome { result, attempts }
    }

    /// Reuse the first joker parameter whose value already passes the checks
    async fn try_jokers(
        &self,
        task: &Task,
        parameters: &HashMap<String, String>,
        log: &AttemptLog,
    ) -> Option<String> {
        for joker in &task.joker_parameter_names {
            let Some(value) = parameters.get(joker) else {
                continue;
            };

            let checked = self
                .check_format(task, value.clone())
                .and_then(|value| self.check_expectations(task, value));

            let mut entries = log.lock().await;
            match checked {
                Ok(value) => {
                    debug!("Task {} reuses joker parameter {}", task.name, joker);
                    entries.push(AttemptReport {
                        attempt: 0,
                        joker: Some(joker.clone()),
                        item: None,
                        result: Some(value.clone()),
                        error: None,
                    });
                    return Some(value);
                }
                Err(error) => {
                    debug!("Joker {} of task {} rejected: {}", joker, task.name, error);
                    entries.push(AttemptReport {
                        attempt: 0,
                        joker: Some(joker.clone()),
                        item: None,
                        result: None,
                        error: Some(error.to_string()),
                    });
                }
            }
        }
        None
    }

    /// Fresh attempts until one passes or the limit is reached
    ///
    /// `item` is set when running one sub-value of a foreach task; the
    /// task format then applies to the rebuilt value, not to each item.
    async fn execute_attempts(
        &self,
        pipeline: Arc<Pipeline>,
        task: Arc<Task>,
        parameters: HashMap<String, String>,
        log: AttemptLog,
        item: Option<usize>,
    ) -> Result<String, PipelineError> {
        let max_attempts = self.options.max_execution_attempts.max(1);
        let mut errors = Vec::new();

        for attempt in 1..=max_attempts {
            debug!("Task {} attempt {}/{}", task.name, attempt, max_attempts);

            let result = self
                .attempt(&pipeline, &task, &parameters, item.is_none())
                .await;

            let mut entries = log.lock().await;
            match result {
                Ok(value) => {
                    entries.push(AttemptReport {
                        attempt,
                        joker: None,
                        item,
                        result: Some(value.clone()),
                        error: None,
                    });
                    return Ok(value);
                }
                Err(error) => {
                    entries.push(AttemptReport {
                        attempt,
                        joker: None,
                        item,
                        result: None,
                        error: Some(error.to_string()),
                    });

                    if !error.is_retryable() {
                        return Err(error);
                    }
                    warn!("Task {} attempt {} failed: {}", task.name, attempt, error);
                    errors.push(format!("Attempt {}: {}", attempt, error));
                }
            }
        }

        Err(PipelineError::ExecutionAttemptsExhausted {
            task: task.name.clone(),
            attempts: max_attempts,
            errors,
        })
    }

    async fn attempt(
        &self,
        pipeline: &Pipeline,
        task: &Task,
        parameters: &HashMap<String, String>,
        validate_format: bool,
    ) -> Result<String, PipelineError> {
        let reserved = resolve_reserved_parameters(task, pipeline, &self.tools).await?;

        let template = task.content_template();
        let description = task.description.clone().unwrap_or_default();
        let render = || -> Result<(String, HashMap<String, String>), PipelineError> {
            let used = reserved.assemble(&format!("{}\n{}", template, description), parameters)?;
            let rendered = render_template(&template, &used)?;
            debug!("Rendered content for task {}: {}", task.name, rendered);
            Ok((rendered, used))
        };

        let raw = match task.task_type {
            TaskType::Script => self.run_script(task, parameters).await?,
            TaskType::Simple => render()?.0,
            TaskType::Prompt => {
                let (rendered, used) = render()?;
                self.call_model(task, rendered, used).await?
            }
            TaskType::Dialog => {
                let (rendered, used) = render()?;
                let message = render_template(&description, &used)?;
                self.ask_user(task, message, rendered).await?
            }
        };

        let processed = self
            .postprocessing
            .apply(&task.postprocessing_function_names, raw)?;

        let formatted = if validate_format {
            self.check_format(task, processed)?
        } else {
            processed
        };

        self.check_expectations(task, formatted)
    }

    async fn call_model(
        &self,
        task: &Task,
        content: String,
        parameters: HashMap<String, String>,
    ) -> Result<String, PipelineError> {
        let llm = self.tools.llm()?;
        let prompt = Prompt {
            title: task.title().to_string(),
            content,
            parameters,
            model_requirements: task.model_requirements.clone(),
        };

        let result = match task.model_requirements.model_variant {
            ModelVariant::Chat => llm.call_chat_model(&prompt).await?,
            ModelVariant::Completion => llm.call_completion_model(&prompt).await?,
            ModelVariant::Embedding => {
                return Err(PipelineError::Configuration(format!(
                    "Task \"{}\" can not use the embedding model for text",
                    task.name
                )))
            }
        };

        debug!("Task {} answered by {}", task.name, result.model_name);
        Ok(result.content)
    }

    /// Try each script tool supporting the language until one succeeds
    async fn run_script(
        &self,
        task: &Task,
        parameters: &HashMap<String, String>,
    ) -> Result<String, PipelineError> {
        let language = task.content_language.ok_or_else(|| {
            PipelineError::Configuration(format!("Script task \"{}\" has no language", task.name))
        })?;

        if self.tools.script.is_empty() {
            return Err(ToolError::NotConfigured("script".to_string()).into());
        }

        let mut visible: HashMap<String, String> = task
            .dependent_parameter_names
            .iter()
            .filter_map(|name| parameters.get(name).map(|value| (name.clone(), value.clone())))
            .collect();
        if let Some(foreach) = &task.foreach {
            for name in &foreach.input_subparameter_names {
                if let Some(value) = parameters.get(name) {
                    visible.insert(name.clone(), value.clone());
                }
            }
        }

        let mut failures = Vec::new();
        for tools in self.tools.script.iter().filter(|tools| tools.supports(language)) {
            match tools.execute(language, &task.content, &visible).await {
                Ok(output) => return Ok(output),
                Err(error) => failures.push(error.to_string()),
            }
        }

        if failures.is_empty() {
            return Err(ToolError::Unsupported(format!("Script language {}", language)).into());
        }
        Err(ToolError::Script(failures.join("\n")).into())
    }

    async fn ask_user(
        &self,
        task: &Task,
        message: String,
        default_value: String,
    ) -> Result<String, PipelineError> {
        let user_interface = self
            .tools
            .user_interface
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("user interface".to_string()))?;

        let options = DialogOptions {
            prompt_title: task.title().to_string(),
            prompt_message: message,
            default_value: Some(default_value),
            placeholder: None,
        };

        Ok(user_interface.prompt_dialog(&options).await?)
    }

    fn check_format(&self, task: &Task, value: String) -> Result<String, PipelineError> {
        match &task.format {
            Some(format_name) => self.formats.validate_or_heal(format_name, &value),
            None => Ok(value),
        }
    }

    fn check_expectations(&self, task: &Task, value: String) -> Result<String, PipelineError> {
        task.expectations.check(&value)?;
        Ok(value)
    }

    /// Run the attempt loop once per sub-value and rebuild the value
    async fn execute_foreach(
        &self,
        pipeline: Arc<Pipeline>,
        task: Arc<Task>,
        parameters: HashMap<String, String>,
        foreach: ForeachDefinition,
        log: AttemptLog,
    ) -> Result<String, PipelineError> {
        let format = self.formats.get(&foreach.format_name).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "Format \"{}\" of foreach in task \"{}\" is not registered",
                foreach.format_name, task.name
            ))
        })?;
        let subvalue = format
            .subvalue_definition(&foreach.subformat_name)
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "Format {} has no sub-value {}",
                    format.format_name(),
                    foreach.subformat_name
                ))
            })?;
        let value = parameters
            .get(&foreach.parameter_name)
            .cloned()
            .ok_or_else(|| {
                PipelineError::Unexpected(format!(
                    "Parameter `{{{}}}` is not resolved",
                    foreach.parameter_name
                ))
            })?;

        info!(
            "Task {} runs for each {} of `{{{}}}`",
            task.name, foreach.subformat_name, foreach.parameter_name
        );

        let executor = self.clone();
        let mapper_task = task.clone();
        let mapper_foreach = foreach.clone();
        let mapper = move |fields: SubvalueParameters, index: usize| -> SubvalueFuture {
            let executor = executor.clone();
            let pipeline = pipeline.clone();
            let task = mapper_task.clone();
            let foreach = mapper_foreach.clone();
            let mut item_parameters = parameters.clone();
            let log = log.clone();

            async move {
                bind_subparameters(&foreach, fields, &mut item_parameters)?;
                executor
                    .execute_attempts(pipeline, task, item_parameters, log, Some(index))
                    .await
            }
            .boxed()
        };

        let mapped = subvalue
            .map_values(&value, &foreach.output_subparameter_name, &mapper)
            .await?;

        self.check_format(&task, mapped)
    }
}

/// Expose the fields of one sub-value under the task's sub-parameter names
fn bind_subparameters(
    foreach: &ForeachDefinition,
    mut fields: SubvalueParameters,
    parameters: &mut HashMap<String, String>,
) -> Result<(), PipelineError> {
    let names = &foreach.input_subparameter_names;

    if names.len() == 1 && fields.len() == 1 && !fields.contains_key(&names[0]) {
        if let Some((_, value)) = fields.drain().next() {
            parameters.insert(names[0].clone(), value);
        }
        return Ok(());
    }

    for name in names {
        let value = fields.remove(name).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "Sub-parameter `{{{}}}` is not available in {} {}",
                name, foreach.format_name, foreach.subformat_name
            ))
        })?;
        parameters.insert(name.clone(), value);
    }

    Ok(())
}
