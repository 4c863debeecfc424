//! Pipeline domain model

use crate::core::parameters::is_reserved_parameter_name;
use crate::core::task::Task;
use crate::knowledge::KnowledgePiece;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declaration of a pipeline parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Must be supplied by the caller of the pipeline
    #[serde(default)]
    pub is_input: bool,

    /// Returned to the caller after the run
    #[serde(default)]
    pub is_output: bool,
}

impl ParameterDefinition {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_input: true,
            is_output: false,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_input: false,
            is_output: true,
        }
    }

    pub fn intermediate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_input: false,
            is_output: false,
        }
    }
}

/// A parsed pipeline, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Pipeline title, used in reports and error messages
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,

    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,

    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub knowledge_pieces: Vec<KnowledgePiece>,
}

impl Pipeline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pipeline_url: None,
            parameters: Vec::new(),
            tasks: Vec::new(),
            knowledge_pieces: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_knowledge_piece(mut self, piece: KnowledgePiece) -> Self {
        self.knowledge_pieces.push(piece);
        self
    }

    /// Get a task by name
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Names of the parameters the caller must supply
    pub fn input_parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.is_input)
            .map(|parameter| parameter.name.as_str())
            .collect()
    }

    /// Names of the parameters returned after a run
    pub fn output_parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.is_output)
            .map(|parameter| parameter.name.as_str())
            .collect()
    }

    /// The task whose result is stored in the given parameter
    pub fn producer_of(&self, parameter_name: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.resulting_parameter_name == parameter_name)
    }

    /// Task names in an order where every producer precedes its consumers
    pub fn execution_order(&self) -> Vec<String> {
        let producers: HashMap<&str, &Task> = self
            .tasks
            .iter()
            .map(|task| (task.resulting_parameter_name.as_str(), task))
            .collect();

        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for task in &self.tasks {
            Self::visit(task, &producers, &mut visited, &mut result);
        }

        result
    }

    fn visit<'a>(
        task: &'a Task,
        producers: &HashMap<&str, &'a Task>,
        visited: &mut HashSet<&'a str>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(task.name.as_str()) {
            return;
        }

        for dependency in &task.dependent_parameter_names {
            if is_reserved_parameter_name(dependency) {
                continue;
            }
            if let Some(producer) = producers.get(dependency.as_str()) {
                Self::visit(producer, producers, visited, result);
            }
        }

        result.push(task.name.clone());
    }
}
