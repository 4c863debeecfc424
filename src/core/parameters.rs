//! Pipeline parameters - the values flowing between tasks

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter names computed by the engine itself for every task
pub const RESERVED_PARAMETER_NAMES: [&str; 6] = [
    "content",
    "context",
    "knowledge",
    "examples",
    "modelName",
    "currentDate",
];

/// Check if a parameter name is reserved for the engine
pub fn is_reserved_parameter_name(name: &str) -> bool {
    RESERVED_PARAMETER_NAMES.contains(&name)
}

/// Resolved parameter values of a single pipeline run
///
/// The map only ever grows: once a value is stored it is never replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    values: HashMap<String, String>,
}

impl Parameters {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a parameter, refusing to overwrite an existing value
    pub fn set_parameter(&mut self, name: &str, value: String) -> Result<(), PipelineError> {
        if self.values.contains_key(name) {
            return Err(PipelineError::Unexpected(format!(
                "Parameter `{{{}}}` is already defined and can not be overwritten",
                name
            )));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Get a parameter
    pub fn get_parameter(&self, name: &str) -> Option<&String> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of all values, handed to a task that is about to run
    pub fn to_map(&self) -> HashMap<String, String> {
        self.values.clone()
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.values
    }
}
