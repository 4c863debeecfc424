//! Task scheduler - determines which tasks can start next

use crate::core::parameters::RESERVED_PARAMETER_NAMES;
use crate::core::task::Task;
use std::collections::HashSet;

/// Tracks resolved parameters and hands out ready tasks in declaration order
pub struct TaskScheduler {
    pending: Vec<Task>,
    resolved: HashSet<String>,
}

impl TaskScheduler {
    /// Reserved names count as resolved from the start
    pub fn new<I>(tasks: Vec<Task>, resolved: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut resolved: HashSet<String> = resolved.into_iter().collect();
        resolved.extend(RESERVED_PARAMETER_NAMES.iter().map(|name| name.to_string()));

        Self {
            pending: tasks,
            resolved,
        }
    }

    /// Remove and return up to `limit` tasks whose dependencies are all resolved
    pub fn next_ready(&mut self, limit: usize) -> Vec<Task> {
        let mut ready = Vec::new();
        let mut index = 0;

        while index < self.pending.len() && ready.len() < limit {
            if self.pending[index].dependencies_met(&self.resolved) {
                ready.push(self.pending.remove(index));
            } else {
                index += 1;
            }
        }

        ready
    }

    pub fn mark_resolved(&mut self, parameter_name: impl Into<String>) {
        self.resolved.insert(parameter_name.into());
    }

    pub fn is_resolved(&self, parameter_name: &str) -> bool {
        self.resolved.contains(parameter_name)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Dependencies of a pending task that are still unresolved
    pub fn missing_dependencies<'a>(&self, task: &'a Task) -> Vec<&'a str> {
        task.dependent_parameter_names
            .iter()
            .filter(|name| !self.resolved.contains(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Drain the tasks that never became ready
    pub fn take_unresolved(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.pending)
    }
}
