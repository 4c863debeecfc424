//! Task domain model

use crate::core::expectations::Expectations;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Placeholder standing for the task's own content inside a prepared template
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    /// Prompt sent to a language model
    #[serde(alias = "PROMPT_TASK")]
    Prompt,
    /// Script run by the script execution tools
    #[serde(alias = "SCRIPT_TASK")]
    Script,
    /// Plain template rendering, no external call
    #[serde(alias = "SIMPLE_TASK")]
    Simple,
    /// Question answered by the user
    #[serde(alias = "DIALOG_TASK")]
    Dialog,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskType::Prompt => "PROMPT",
            TaskType::Script => "SCRIPT",
            TaskType::Simple => "SIMPLE",
            TaskType::Dialog => "DIALOG",
        };
        f.write_str(name)
    }
}

/// Which model interface a prompt is sent to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelVariant {
    #[default]
    Chat,
    Completion,
    Embedding,
}

/// Requirements a prompt places on the model executing it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequirements {
    #[serde(default)]
    pub model_variant: ModelVariant,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Language of a script task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Javascript,
    Typescript,
    Python,
    Bash,
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptLanguage::Javascript => "javascript",
            ScriptLanguage::Typescript => "typescript",
            ScriptLanguage::Python => "python",
            ScriptLanguage::Bash => "bash",
        };
        f.write_str(name)
    }
}

/// Run a task once per sub-value (row, cell, line) of a structured parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeachDefinition {
    /// Format of the iterated parameter, e.g. `CSV`
    pub format_name: String,

    /// Sub-value of the format to iterate, e.g. `ROW`
    pub subformat_name: String,

    /// Parameter holding the structured value
    pub parameter_name: String,

    /// Names under which each sub-value's fields are exposed to the task content
    #[serde(default)]
    pub input_subparameter_names: Vec<String>,

    /// Name of the column / field the per-item result is written to
    pub output_subparameter_name: String,
}

/// A single task in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier
    pub name: String,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub task_type: TaskType,

    /// The content template (or script source for script tasks)
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<ScriptLanguage>,

    #[serde(default)]
    pub model_requirements: ModelRequirements,

    /// Parameters that must be resolved before this task can run
    #[serde(default)]
    pub dependent_parameter_names: Vec<String>,

    /// Parameters tried as the result before any execution
    #[serde(default)]
    pub joker_parameter_names: Vec<String>,

    #[serde(default)]
    pub postprocessing_function_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Expectations::is_empty")]
    pub expectations: Expectations,

    /// Name of the format the output must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreach: Option<ForeachDefinition>,

    /// Where the final value of this task is stored
    pub resulting_parameter_name: String,

    /// Template wrapping the content, filled by the prepare pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_content: Option<String>,
}

impl Task {
    /// Create a task with the minimal set of fields
    pub fn new(
        name: impl Into<String>,
        task_type: TaskType,
        content: impl Into<String>,
        resulting_parameter_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            task_type,
            content: content.into(),
            content_language: None,
            model_requirements: ModelRequirements::default(),
            dependent_parameter_names: Vec::new(),
            joker_parameter_names: Vec::new(),
            postprocessing_function_names: Vec::new(),
            expectations: Expectations::default(),
            format: None,
            foreach: None,
            resulting_parameter_name: resulting_parameter_name.into(),
            prepared_content: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependent_parameter_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_jokers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joker_parameter_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_postprocessing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.postprocessing_function_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = expectations;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_foreach(mut self, foreach: ForeachDefinition) -> Self {
        self.foreach = Some(foreach);
        self
    }

    pub fn with_language(mut self, language: ScriptLanguage) -> Self {
        self.content_language = Some(language);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_model_requirements(mut self, requirements: ModelRequirements) -> Self {
        self.model_requirements = requirements;
        self
    }

    /// Title for display, falling back to the name
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Check if this task lists the parameter as a dependency
    pub fn depends_on(&self, parameter_name: &str) -> bool {
        self.dependent_parameter_names
            .iter()
            .any(|name| name == parameter_name)
    }

    /// Check if all dependencies are satisfied by the resolved parameter names
    pub fn dependencies_met(&self, resolved_parameter_names: &HashSet<String>) -> bool {
        self.dependent_parameter_names
            .iter()
            .all(|name| resolved_parameter_names.contains(name))
    }

    /// The template to render: the prepared wrapper with this task's content spliced in
    pub fn content_template(&self) -> String {
        match &self.prepared_content {
            Some(prepared) => prepared.replace(CONTENT_PLACEHOLDER, &self.content),
            None => self.content.clone(),
        }
    }
}
