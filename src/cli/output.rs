//! CLI output formatting

use crate::core::{ExecutionStatus, TaskState};
use crate::execution::ExecutionEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a task state for display
pub fn format_task_state(state: &TaskState) -> String {
    match state {
        TaskState::Pending => style("PENDING").dim().to_string(),
        TaskState::Running { attempt, .. } => {
            style(format!("RUNNING (attempt {})", attempt)).yellow().to_string()
        }
        TaskState::Completed { attempts, .. } => {
            style(format!("COMPLETED ({} attempts)", attempts)).green().to_string()
        }
        TaskState::Failed { .. } => style("FAILED").red().to_string(),
        TaskState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_title,
            task_count,
        } => format!(
            "{} Starting pipeline {} with {} tasks ({})",
            ROCKET,
            style(pipeline_title).bold(),
            task_count,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::TaskStarted { title, .. } => {
            format!("{} {}", SPINNER, style(title).cyan())
        }
        ExecutionEvent::TaskCompleted { task_name, attempts } => {
            if *attempts > 1 {
                format!(
                    "{} {} ({} attempts)",
                    CHECK,
                    style(task_name).green(),
                    style(attempts).dim()
                )
            } else {
                format!("{} {}", CHECK, style(task_name).green())
            }
        }
        ExecutionEvent::TaskFailed { task_name, error } => {
            format!("{} {}: {}", CROSS, style(task_name).red(), style(error).dim())
        }
        ExecutionEvent::TaskSkipped { task_name, reason } => {
            format!("{} {} skipped: {}", WARN, style(task_name).yellow(), style(reason).dim())
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format a parameter value with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
