//! Main execution engine - orchestrates the entire pipeline run

use crate::core::{
    ExecutionOptions, ExecutionStatus, Parameters, Pipeline, PipelineError, PipelineState,
    TaskState,
};
use crate::execution::executor::{AttemptReport, TaskExecutor};
use crate::execution::scheduler::TaskScheduler;
use crate::formats::FormatRegistry;
use crate::postprocessing::PostprocessingRegistry;
use crate::tools::ExecutionTools;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_title: String,
        task_count: usize,
    },
    TaskStarted {
        task_name: String,
        title: String,
    },
    TaskCompleted {
        task_name: String,
        attempts: usize,
    },
    TaskFailed {
        task_name: String,
        error: String,
    },
    TaskSkipped {
        task_name: String,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// What happened to one task during a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_name: String,
    pub title: String,
    pub state: TaskState,
    pub attempts: Vec<AttemptReport>,
}

/// Per-task record of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub pipeline_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    pub tasks: Vec<TaskReport>,
}

/// Result of `ExecutionEngine::execute_pipeline`
///
/// Partial results are kept even when the run fails.
#[derive(Debug)]
pub struct PipelineExecutorResult {
    pub execution_id: Uuid,
    pub output_parameters: HashMap<String, String>,
    pub is_successful: bool,
    pub errors: Vec<PipelineError>,
    pub warnings: Vec<String>,
    pub execution_report: ExecutionReport,
    pub state: PipelineState,
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    executor: TaskExecutor,
    options: ExecutionOptions,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ExecutionEngine {
    /// Engine with the default formats and postprocessing functions
    pub fn new(tools: ExecutionTools, options: ExecutionOptions) -> Self {
        let formats = FormatRegistry::with_defaults(options.csv_settings.clone());
        Self::with_registries(tools, options, formats, PostprocessingRegistry::with_defaults())
    }

    /// Engine with explicit registries
    pub fn with_registries(
        tools: ExecutionTools,
        options: ExecutionOptions,
        formats: FormatRegistry,
        postprocessing: PostprocessingRegistry,
    ) -> Self {
        let executor = TaskExecutor::new(
            tools,
            Arc::new(formats),
            Arc::new(postprocessing),
            options.clone(),
        );

        Self {
            executor,
            options,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute a prepared pipeline with the given input parameters
    pub async fn execute_pipeline(
        &self,
        pipeline: &Pipeline,
        input_parameters: HashMap<String, String>,
    ) -> PipelineExecutorResult {
        let mut state = PipelineState::new();
        let execution_id = state.execution_id;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut reports: Vec<TaskReport> = pipeline
            .tasks
            .iter()
            .map(|task| TaskReport {
                task_name: task.name.clone(),
                title: task.title().to_string(),
                state: TaskState::Pending,
                attempts: Vec::new(),
            })
            .collect();
        let report_index: HashMap<String, usize> = pipeline
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (task.name.clone(), index))
            .collect();

        info!("Starting pipeline execution: {} ({})", pipeline.title, execution_id);
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_title: pipeline.title.clone(),
            task_count: pipeline.tasks.len(),
        })
        .await;

        state.start(pipeline.tasks.len());

        if let Err(validation_error) = pipeline.validate() {
            errors.push(validation_error);
        }

        let mut parameters = Parameters::new();
        if errors.is_empty() {
            for name in pipeline.input_parameter_names() {
                match input_parameters.get(name) {
                    Some(value) => {
                        if let Err(set_error) = parameters.set_parameter(name, value.clone()) {
                            errors.push(set_error);
                        }
                    }
                    None => errors.push(PipelineError::Configuration(format!(
                        "Input parameter `{{{}}}` is required but was not provided",
                        name
                    ))),
                }
            }

            let declared = pipeline.input_parameter_names();
            let mut extra: Vec<&String> = input_parameters
                .keys()
                .filter(|name| !declared.contains(&name.as_str()))
                .collect();
            extra.sort();
            for name in extra {
                warn!("Ignoring undeclared input parameter {}", name);
                warnings.push(format!(
                    "Parameter `{{{}}}` was passed but is not a declared input, it is ignored",
                    name
                ));
            }
        }

        if errors.is_empty() {
            self.run_tasks(pipeline, &mut parameters, &mut state, &mut reports, &report_index, &mut errors, &mut warnings)
                .await;
        }

        for report in reports.iter_mut().filter(|report| !report.state.is_terminal()) {
            report.state = TaskState::Skipped {
                reason: "Pipeline did not start".to_string(),
            };
        }

        let output_parameters = self.collect_outputs(pipeline, &parameters, errors.is_empty(), &mut warnings);
        let is_successful = errors.is_empty();

        let status = if is_successful {
            state.complete();
            ExecutionStatus::Completed
        } else {
            state.fail();
            ExecutionStatus::Failed
        };

        info!(
            "Pipeline execution finished: {} - {:?} ({:.0}% of tasks finished)",
            pipeline.title,
            status,
            state.progress() * 100.0
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        })
        .await;

        PipelineExecutorResult {
            execution_id,
            output_parameters,
            is_successful,
            errors,
            warnings,
            execution_report: ExecutionReport {
                pipeline_title: pipeline.title.clone(),
                pipeline_url: pipeline.pipeline_url.clone(),
                tasks: reports,
            },
            state,
        }
    }

    /// Dependency-driven loop with at most `max_parallel_count` tasks in flight
    #[allow(clippy::too_many_arguments)]
    async fn run_tasks(
        &self,
        pipeline: &Pipeline,
        parameters: &mut Parameters,
        state: &mut PipelineState,
        reports: &mut [TaskReport],
        report_index: &HashMap<String, usize>,
        errors: &mut Vec<PipelineError>,
        warnings: &mut Vec<String>,
    ) {
        let shared_pipeline = Arc::new(pipeline.clone());
        let max_parallel = self.options.max_parallel_count.max(1);
        let mut scheduler = TaskScheduler::new(pipeline.tasks.clone(), parameters.names().cloned());
        let mut running = FuturesUnordered::new();

        loop {
            for task in scheduler.next_ready(max_parallel - running.len()) {
                let started_at = Utc::now();
                if let Some(&index) = report_index.get(&task.name) {
                    reports[index].state = TaskState::Running {
                        started_at,
                        attempt: 1,
                    };
                }
                state.running_tasks += 1;

                self.emit_event(ExecutionEvent::TaskStarted {
                    task_name: task.name.clone(),
                    title: task.title().to_string(),
                })
                .await;

                let executor = self.executor.clone();
                let pipeline = shared_pipeline.clone();
                let snapshot = parameters.to_map();
                let task = Arc::new(task);
                running.push(async move {
                    let outcome = executor.execute_task(pipeline, task.clone(), snapshot).await;
                    (task, started_at, outcome)
                });
            }

            let Some((task, started_at, outcome)) = running.next().await else {
                break;
            };
            state.running_tasks -= 1;

            let attempts = outcome.attempts.len();
            let stored = outcome
                .result
                .and_then(|value| {
                    parameters.set_parameter(&task.resulting_parameter_name, value.clone())?;
                    Ok(value)
                });

            let report_state = match stored {
                Ok(value) => {
                    info!("Task {} completed", task.name);
                    scheduler.mark_resolved(task.resulting_parameter_name.clone());
                    state.completed_tasks += 1;
                    self.emit_event(ExecutionEvent::TaskCompleted {
                        task_name: task.name.clone(),
                        attempts,
                    })
                    .await;
                    TaskState::Completed {
                        value,
                        attempts,
                        started_at,
                        completed_at: Utc::now(),
                    }
                }
                Err(task_error) => {
                    error!("Task {} failed: {}", task.name, task_error);
                    state.failed_tasks += 1;
                    self.emit_event(ExecutionEvent::TaskFailed {
                        task_name: task.name.clone(),
                        error: task_error.to_string(),
                    })
                    .await;
                    let report_state = TaskState::Failed {
                        error: task_error.to_string(),
                        attempts,
                        failed_at: Utc::now(),
                    };
                    errors.push(task_error);
                    report_state
                }
            };

            if let Some(&index) = report_index.get(&task.name) {
                reports[index].state = report_state;
                reports[index].attempts = outcome.attempts;
            }
        }

        let unresolved = scheduler.take_unresolved();
        for task in &unresolved {
            let missing = scheduler
                .missing_dependencies(task)
                .iter()
                .map(|name| format!("`{{{}}}`", name))
                .collect::<Vec<_>>()
                .join(", ");
            let reason = format!("Parameters {} were never resolved", missing);

            warn!("Task {} was not executed: {}", task.name, reason);
            warnings.push(format!("Task \"{}\" was not executed: {}", task.name, reason));
            self.emit_event(ExecutionEvent::TaskSkipped {
                task_name: task.name.clone(),
                reason: reason.clone(),
            })
            .await;

            if let Some(&index) = report_index.get(&task.name) {
                reports[index].state = TaskState::Skipped { reason };
            }
        }

        if errors.is_empty() && !unresolved.is_empty() {
            errors.push(PipelineError::Unexpected(format!(
                "{} tasks could not be executed although no task failed",
                unresolved.len()
            )));
        }
    }

    /// Declared outputs, or every parameter when none are declared
    fn collect_outputs(
        &self,
        pipeline: &Pipeline,
        parameters: &Parameters,
        is_successful: bool,
        warnings: &mut Vec<String>,
    ) -> HashMap<String, String> {
        let declared = pipeline.output_parameter_names();
        if declared.is_empty() {
            return parameters.to_map();
        }

        let mut outputs = HashMap::new();
        for name in declared {
            match parameters.get_parameter(name) {
                Some(value) => {
                    outputs.insert(name.to_string(), value.clone());
                }
                None if is_successful => {
                    warnings.push(format!(
                        "Output parameter `{{{}}}` was never produced",
                        name
                    ));
                }
                None => {}
            }
        }
        outputs
    }
}
