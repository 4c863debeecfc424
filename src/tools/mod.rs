//! Execution tools: the seams through which tasks reach models, scripts and users

pub mod dialog;
pub mod response;
pub mod subprocess;

use crate::core::task::ScriptLanguage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use dialog::TerminalDialogTools;
pub use response::{DialogOptions, EmbeddingResult, Prompt, PromptResult, TokenUsage, ToolError};
pub use subprocess::{CommandLlmTools, SubprocessScriptTools};

/// Access to language models
#[async_trait]
pub trait LlmExecutionTools: Send + Sync {
    /// Send a prompt to a chat model
    async fn call_chat_model(&self, prompt: &Prompt) -> Result<PromptResult, ToolError>;

    /// Send a prompt to a completion model
    async fn call_completion_model(&self, _prompt: &Prompt) -> Result<PromptResult, ToolError> {
        Err(ToolError::Unsupported("Completion model".to_string()))
    }

    /// Embed the prompt content
    async fn call_embedding_model(&self, _prompt: &Prompt) -> Result<EmbeddingResult, ToolError> {
        Err(ToolError::Unsupported("Embedding model".to_string()))
    }
}

/// Runs script tasks
#[async_trait]
pub trait ScriptExecutionTools: Send + Sync {
    fn supports(&self, _language: ScriptLanguage) -> bool {
        true
    }

    /// Run the script with the task's parameters available to it
    async fn execute(
        &self,
        language: ScriptLanguage,
        script: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ToolError>;
}

/// Asks the user a question
#[async_trait]
pub trait UserInterfaceTools: Send + Sync {
    async fn prompt_dialog(&self, options: &DialogOptions) -> Result<String, ToolError>;
}

/// Every tool a pipeline run may use
#[derive(Clone, Default)]
pub struct ExecutionTools {
    pub llm: Option<Arc<dyn LlmExecutionTools>>,

    /// Tried in order until one supports the script language
    pub script: Vec<Arc<dyn ScriptExecutionTools>>,

    pub user_interface: Option<Arc<dyn UserInterfaceTools>>,
}

impl ExecutionTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmExecutionTools>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_script(mut self, script: Arc<dyn ScriptExecutionTools>) -> Self {
        self.script.push(script);
        self
    }

    pub fn with_user_interface(mut self, user_interface: Arc<dyn UserInterfaceTools>) -> Self {
        self.user_interface = Some(user_interface);
        self
    }

    /// The LLM tools, or an error naming what is missing
    pub fn llm(&self) -> Result<&Arc<dyn LlmExecutionTools>, ToolError> {
        self.llm
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("LLM".to_string()))
    }
}

impl std::fmt::Debug for ExecutionTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTools")
            .field("llm", &self.llm.is_some())
            .field("script", &self.script.len())
            .field("user_interface", &self.user_interface.is_some())
            .finish()
    }
}
