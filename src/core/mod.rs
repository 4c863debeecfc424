//! Core domain models for pipelines
//!
//! This module defines the fundamental data structures that represent
//! pipelines, tasks, parameters and their validation.

pub mod config;
pub mod error;
pub mod expectations;
pub mod parameters;
pub mod pipeline;
pub mod state;
pub mod task;

pub use config::*;
pub use error::*;
pub use expectations::*;
pub use parameters::*;
pub use pipeline::*;
pub use state::*;
pub use task::*;
