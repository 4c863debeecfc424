//! Prompts sent to tools and the results they return

use crate::core::task::ModelRequirements;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error types for tool operations
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("{0} is not supported by these tools")]
    Unsupported(String),

    #[error("No {0} tools are configured")]
    NotConfigured(String),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A rendered prompt ready for a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub title: String,

    /// Final text with every parameter substituted
    pub content: String,

    /// Parameters the content was rendered with
    pub parameters: HashMap<String, String>,

    pub model_requirements: ModelRequirements,
}

/// Response from a chat or completion model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    /// The response content
    pub content: String,

    /// Model that actually answered
    pub model_name: String,

    /// Token usage information (if available)
    pub usage: Option<TokenUsage>,
}

impl PromptResult {
    pub fn new(content: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model_name: model_name.into(),
            usage: None,
        }
    }
}

/// Response from an embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub content: Vec<f64>,
    pub model_name: String,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What the user is asked in a dialog task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogOptions {
    pub prompt_title: String,
    pub prompt_message: String,
    /// Answer used when the user enters nothing
    pub default_value: Option<String>,
    pub placeholder: Option<String>,
}
