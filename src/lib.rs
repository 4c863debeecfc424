//! taskbook - executes declarative LLM pipelines

pub mod cli;
pub mod core;
pub mod execution;
pub mod formats;
pub mod knowledge;
pub mod postprocessing;
pub mod templates;
pub mod tools;

// Re-export commonly used types
pub use core::{
    ExecutionOptions, ExecutionStatus, Expectations, ParameterDefinition, Pipeline,
    PipelineError, Task, TaskState, TaskType, TemplateError,
};
pub use execution::{
    prepare_pipeline, ExecutionEngine, ExecutionEvent, ExecutionReport, PipelineExecutorResult,
};
pub use formats::{FormatDefinition, FormatRegistry};
pub use knowledge::KnowledgePiece;
pub use postprocessing::PostprocessingRegistry;
pub use templates::render_template;
pub use tools::{ExecutionTools, LlmExecutionTools, ScriptExecutionTools, UserInterfaceTools};
