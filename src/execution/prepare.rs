//! Prepare pass - rewrites tasks before execution

use crate::core::config::ExecutionOptions;
use crate::core::error::PipelineError;
use crate::core::pipeline::Pipeline;
use crate::core::task::Task;
use futures::stream::{self, StreamExt};
use tracing::debug;

/// Wraps a task's content so retrieved knowledge follows it
pub const KNOWLEDGE_TEMPLATE: &str = "{content}\n\n## Knowledge\n\n{knowledge}";

const KNOWLEDGE: &str = "knowledge";

fn prepare_task(mut task: Task, has_knowledge: bool) -> Task {
    if has_knowledge && !task.depends_on(KNOWLEDGE) {
        debug!("Adding knowledge to task {}", task.name);
        task.prepared_content = Some(KNOWLEDGE_TEMPLATE.to_string());
        task.dependent_parameter_names.push(KNOWLEDGE.to_string());
    }
    task
}

/// Prepare every task, at most `max_parallel_count` at a time
///
/// The result keeps the original task order.
pub async fn prepare_tasks(
    pipeline: &Pipeline,
    options: &ExecutionOptions,
) -> Result<Vec<Task>, PipelineError> {
    let has_knowledge = !pipeline.knowledge_pieces.is_empty();
    let mut slots: Vec<Option<Task>> = vec![None; pipeline.tasks.len()];

    let mut prepared = stream::iter(pipeline.tasks.iter().cloned().enumerate())
        .map(|(index, task)| async move { (index, prepare_task(task, has_knowledge)) })
        .buffer_unordered(options.max_parallel_count.max(1));

    while let Some((index, task)) = prepared.next().await {
        slots[index] = Some(task);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                PipelineError::Unexpected(format!("Task #{} was not prepared", index))
            })
        })
        .collect()
}

/// A copy of the pipeline with prepared tasks
pub async fn prepare_pipeline(
    pipeline: &Pipeline,
    options: &ExecutionOptions,
) -> Result<Pipeline, PipelineError> {
    let tasks = prepare_tasks(pipeline, options).await?;
    Ok(Pipeline {
        tasks,
        ..pipeline.clone()
    })
}
