//! Scenario-based tests for taskbook

mod helpers;

mod failure_handling;
mod foreach_csv;
mod knowledge_injection;
mod parallel_dependencies;
mod retry_behavior;
mod template_rendering;
