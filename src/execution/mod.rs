//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod prepare;
pub mod reserved;
pub mod scheduler;

pub use engine::{
    EventHandler, ExecutionEngine, ExecutionEvent, ExecutionReport, PipelineExecutorResult,
    TaskReport,
};
pub use executor::{AttemptReport, TaskExecutor, TaskOutcome};
pub use prepare::{prepare_pipeline, prepare_tasks, KNOWLEDGE_TEMPLATE};
pub use reserved::{resolve_reserved_parameters, ReservedParameters, ReservedValue};
pub use scheduler::TaskScheduler;
