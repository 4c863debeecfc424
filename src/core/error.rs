//! Error taxonomy for pipeline execution

use crate::core::expectations::ExpectationUnit;
use crate::tools::ToolError;
use thiserror::Error;

/// Malformed or unresolvable `{parameter}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Parameter `{{{0}}}` is not defined")]
    ParameterNotDefined(String),

    #[error("Parameter is not closed")]
    ParameterNotClosed,

    #[error("Parameter is not opened")]
    ParameterNotOpened,
}

/// Errors raised while preparing or executing a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{format_name} value is not valid: {message}\n\nSettings: {settings}\n\nData:\n{data}")]
    FormatValidation {
        format_name: String,
        message: String,
        settings: String,
        data: String,
    },

    #[error("Can not overwrite existing column \"{column}\" in {format_name} value")]
    ColumnCollision { format_name: String, column: String },

    #[error("Embedding vectors must have the same length ({left} != {right})")]
    EmbeddingDimension { left: usize, right: usize },

    #[error("Reserved parameter `{{{parameter}}}` is not defined in pipeline \"{pipeline}\"")]
    ReservedParameterIncomplete { parameter: String, pipeline: String },

    #[error("{message}")]
    ExpectationUnmet {
        unit: ExpectationUnit,
        actual: usize,
        message: String,
    },

    #[error("Task \"{task}\" failed after {attempts} attempts:\n{}", .errors.join("\n"))]
    ExecutionAttemptsExhausted {
        task: String,
        attempts: usize,
        errors: Vec<String>,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Whether a fresh attempt of the same task may succeed
    ///
    /// Configuration problems and internal inconsistencies are deterministic,
    /// so retrying them would only burn attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PipelineError::ReservedParameterIncomplete { .. }
                | PipelineError::Configuration(_)
                | PipelineError::Unexpected(_)
                | PipelineError::ExecutionAttemptsExhausted { .. }
        )
    }
}
