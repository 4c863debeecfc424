//! Reserved parameters computed by the engine for each task

use crate::core::error::PipelineError;
use crate::core::parameters::{is_reserved_parameter_name, RESERVED_PARAMETER_NAMES};
use crate::core::pipeline::Pipeline;
use crate::core::task::Task;
use crate::knowledge::retrieve_knowledge;
use crate::templates::extract_parameter_names;
use crate::tools::ExecutionTools;
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;

/// Value of a reserved parameter for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservedValue {
    Value(String),
    /// Not computed by this engine
    Missing,
    /// Supplied by other means and never injected as a parameter
    Restricted,
}

/// Reserved parameters resolved for one task attempt
#[derive(Debug, Clone, Default)]
pub struct ReservedParameters {
    values: HashMap<String, ReservedValue>,
}

impl ReservedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ReservedValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ReservedValue> {
        self.values.get(name)
    }

    /// Every reserved name must have an entry, even if it is missing
    pub fn ensure_complete(&self, pipeline_title: &str) -> Result<(), PipelineError> {
        for name in RESERVED_PARAMETER_NAMES {
            if !self.values.contains_key(name) {
                return Err(PipelineError::ReservedParameterIncomplete {
                    parameter: name.to_string(),
                    pipeline: pipeline_title.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Collect the parameters a template actually uses
    ///
    /// Reserved names resolve from this set and must hold a real value.
    /// Other names come from `parameters`; a name absent from both is left
    /// out so rendering reports it.
    pub fn assemble(
        &self,
        template: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, PipelineError> {
        let mut assembled = HashMap::new();

        for name in extract_parameter_names(template) {
            if is_reserved_parameter_name(&name) {
                match self.get(&name) {
                    Some(ReservedValue::Value(value)) => {
                        assembled.insert(name, value.clone());
                    }
                    Some(ReservedValue::Restricted) => {
                        return Err(PipelineError::Unexpected(format!(
                            "Parameter `{{{}}}` is restricted to use",
                            name
                        )));
                    }
                    Some(ReservedValue::Missing) | None => {
                        return Err(PipelineError::Unexpected(format!(
                            "Parameter `{{{}}}` has missing value",
                            name
                        )));
                    }
                }
            } else if let Some(value) = parameters.get(&name) {
                assembled.insert(name, value.clone());
            }
        }

        Ok(assembled)
    }
}

/// Resolve every reserved parameter for the task
pub async fn resolve_reserved_parameters(
    task: &Task,
    pipeline: &Pipeline,
    tools: &ExecutionTools,
) -> Result<ReservedParameters, PipelineError> {
    let knowledge =
        retrieve_knowledge(&task.content, &pipeline.knowledge_pieces, tools.llm.as_deref()).await?;

    let mut reserved = ReservedParameters::new();
    reserved.insert("content", ReservedValue::Restricted);
    reserved.insert("context", ReservedValue::Missing);
    reserved.insert("knowledge", ReservedValue::Value(knowledge));
    reserved.insert("examples", ReservedValue::Missing);
    reserved.insert("modelName", ReservedValue::Missing);
    reserved.insert(
        "currentDate",
        ReservedValue::Value(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    reserved.ensure_complete(&pipeline.title)?;
    Ok(reserved)
}
