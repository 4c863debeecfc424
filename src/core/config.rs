//! Pipeline loading, validation and execution options

use crate::core::error::PipelineError;
use crate::core::parameters::is_reserved_parameter_name;
use crate::core::pipeline::Pipeline;
use crate::core::task::{ModelVariant, TaskType};
use crate::formats::csv::CsvSettings;
use crate::templates::extract_parameter_names;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default number of tasks running at once
pub const DEFAULT_MAX_PARALLEL_COUNT: usize = 5;

/// Default number of fresh attempts per task
pub const DEFAULT_MAX_EXECUTION_ATTEMPTS: usize = 3;

/// Settings for preparing and executing a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
    /// Upper bound on concurrently running tasks (and prepare jobs)
    pub max_parallel_count: usize,

    /// Fresh attempts per task after jokers are exhausted
    pub max_execution_attempts: usize,

    #[serde(default)]
    pub csv_settings: CsvSettings,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_parallel_count: DEFAULT_MAX_PARALLEL_COUNT,
            max_execution_attempts: DEFAULT_MAX_EXECUTION_ATTEMPTS,
            csv_settings: CsvSettings::default(),
        }
    }
}

impl ExecutionOptions {
    pub fn with_max_parallel_count(mut self, count: usize) -> Self {
        self.max_parallel_count = count.max(1);
        self
    }

    pub fn with_max_execution_attempts(mut self, attempts: usize) -> Self {
        self.max_execution_attempts = attempts.max(1);
        self
    }

    pub fn with_csv_settings(mut self, settings: CsvSettings) -> Self {
        self.csv_settings = settings;
        self
    }
}

impl Pipeline {
    /// Load a pipeline from a `.json`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse and validate a pipeline from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let pipeline: Pipeline =
            serde_json::from_str(json).context("Failed to parse pipeline JSON")?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Parse and validate a pipeline from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let pipeline: Pipeline =
            serde_yaml::from_str(yaml).context("Failed to parse pipeline YAML")?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check the structural rules a pipeline must satisfy before it runs
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut declared = HashSet::new();
        for parameter in &self.parameters {
            if is_reserved_parameter_name(&parameter.name) {
                return Err(configuration(format!(
                    "Parameter `{{{}}}` is reserved and can not be declared",
                    parameter.name
                )));
            }
            if !declared.insert(parameter.name.as_str()) {
                return Err(configuration(format!(
                    "Parameter `{{{}}}` is declared more than once",
                    parameter.name
                )));
            }
        }

        let inputs: HashSet<&str> = self.input_parameter_names().into_iter().collect();

        let mut task_names = HashSet::new();
        let mut produced = HashSet::new();
        for task in &self.tasks {
            if !task_names.insert(task.name.as_str()) {
                return Err(configuration(format!("Duplicate task name: {}", task.name)));
            }

            let resulting = task.resulting_parameter_name.as_str();
            if is_reserved_parameter_name(resulting) {
                return Err(configuration(format!(
                    "Task \"{}\" can not store its result in reserved parameter `{{{}}}`",
                    task.name, resulting
                )));
            }
            if inputs.contains(resulting) {
                return Err(configuration(format!(
                    "Task \"{}\" can not overwrite input parameter `{{{}}}`",
                    task.name, resulting
                )));
            }
            if !produced.insert(resulting) {
                return Err(configuration(format!(
                    "Parameter `{{{}}}` is the result of more than one task",
                    resulting
                )));
            }
        }

        for task in &self.tasks {
            for dependency in &task.dependent_parameter_names {
                let known = is_reserved_parameter_name(dependency)
                    || inputs.contains(dependency.as_str())
                    || produced.contains(dependency.as_str());
                if !known {
                    return Err(configuration(format!(
                        "Task \"{}\" depends on parameter `{{{}}}` which is neither an input nor produced by any task",
                        task.name, dependency
                    )));
                }
                if dependency == &task.resulting_parameter_name {
                    return Err(configuration(format!(
                        "Task \"{}\" depends on its own result `{{{}}}`",
                        task.name, dependency
                    )));
                }
            }

            for joker in &task.joker_parameter_names {
                if !task.depends_on(joker) {
                    return Err(configuration(format!(
                        "Joker parameter `{{{}}}` of task \"{}\" must be one of its dependencies",
                        joker, task.name
                    )));
                }
            }
            if !task.joker_parameter_names.is_empty()
                && task.expectations.is_empty()
                && task.format.is_none()
            {
                return Err(configuration(format!(
                    "Task \"{}\" has joker parameters but no expectations or format to check them against",
                    task.name
                )));
            }

            if task.task_type == TaskType::Prompt
                && task.model_requirements.model_variant == ModelVariant::Embedding
            {
                return Err(configuration(format!(
                    "Task \"{}\" uses the EMBEDDING model variant which can not produce text",
                    task.name
                )));
            }

            let mut allowed: HashSet<&str> = task
                .dependent_parameter_names
                .iter()
                .map(String::as_str)
                .collect();
            if let Some(foreach) = &task.foreach {
                if !task.depends_on(&foreach.parameter_name) {
                    return Err(configuration(format!(
                        "Foreach parameter `{{{}}}` of task \"{}\" must be one of its dependencies",
                        foreach.parameter_name, task.name
                    )));
                }
                allowed.extend(foreach.input_subparameter_names.iter().map(String::as_str));
            }

            if task.task_type != TaskType::Script {
                for used in extract_parameter_names(&task.content) {
                    if !allowed.contains(used.as_str()) && !is_reserved_parameter_name(&used) {
                        return Err(configuration(format!(
                            "Parameter `{{{}}}` is used in task \"{}\" but not listed in its dependencies",
                            used, task.name
                        )));
                    }
                }
            }

            task.expectations.validate()?;
        }

        self.check_cycles()
    }

    /// Check for cycles in the parameter dependency graph
    fn check_cycles(&self) -> Result<(), PipelineError> {
        let producers: HashMap<&str, &str> = self
            .tasks
            .iter()
            .map(|task| (task.resulting_parameter_name.as_str(), task.name.as_str()))
            .collect();

        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for task in &self.tasks {
            if !visited.contains(task.name.as_str()) {
                self.dfs_check(&task.name, &producers, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check<'a>(
        &'a self,
        task_name: &'a str,
        producers: &HashMap<&'a str, &'a str>,
        visited: &mut HashSet<&'a str>,
        recursion_stack: &mut HashSet<&'a str>,
    ) -> Result<(), PipelineError> {
        visited.insert(task_name);
        recursion_stack.insert(task_name);

        if let Some(task) = self.task(task_name) {
            for dependency in &task.dependent_parameter_names {
                let Some(&producer) = producers.get(dependency.as_str()) else {
                    continue;
                };
                if recursion_stack.contains(producer) {
                    return Err(configuration(format!(
                        "Cycle detected in dependency graph involving task \"{}\"",
                        producer
                    )));
                }
                if !visited.contains(producer) {
                    self.dfs_check(producer, producers, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(task_name);
        Ok(())
    }
}

fn configuration(message: String) -> PipelineError {
    PipelineError::Configuration(message)
}
