//! Subprocess-backed tools - an external command for the model, interpreters for scripts

use super::{LlmExecutionTools, Prompt, PromptResult, ScriptExecutionTools, ToolError};
use crate::core::task::ScriptLanguage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default timeout for a single model call
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Run a command with a timeout and return its stdout
async fn run_command(
    mut command: Command,
    program: &str,
    timeout_secs: u64,
) -> Result<String, ToolError> {
    let result = timeout(
        Duration::from_secs(timeout_secs),
        command.kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| ToolError::Timeout(timeout_secs))?;

    let output: Output = result
        .map_err(|e| ToolError::Internal(format!("Failed to execute {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        warn!("{} exited with code {}: {}", program, exit_code, stderr.trim());
        return Err(ToolError::Api(format!(
            "{} exited with code {}: {}",
            program,
            exit_code,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| ToolError::Internal(format!("Failed to decode {} output: {}", program, e)))
}

/// Language model reached through an external command
///
/// The rendered prompt is passed as the last argument and stdout is the answer.
#[derive(Debug, Clone)]
pub struct CommandLlmTools {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandLlmTools {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Build from a shell-like command line such as `llm -m gpt-4o`
    pub fn from_command_line(command_line: &str) -> Result<Self, ToolError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ToolError::Internal("LLM command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl LlmExecutionTools for CommandLlmTools {
    async fn call_chat_model(&self, prompt: &Prompt) -> Result<PromptResult, ToolError> {
        debug!(
            "Spawning {} with prompt \"{}\" ({} chars)",
            self.program,
            prompt.title,
            prompt.content.len()
        );

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(system_message) = &prompt.model_requirements.system_message {
            command.env("TASKBOOK_SYSTEM_MESSAGE", system_message);
        }
        command.arg(&prompt.content);

        let content = run_command(command, &self.program, self.timeout_secs).await?;
        debug!("{} returned {} bytes of output", self.program, content.len());

        let model_name = prompt
            .model_requirements
            .model_name
            .clone()
            .unwrap_or_else(|| self.program.clone());

        Ok(PromptResult::new(content.trim_end().to_string(), model_name))
    }

    async fn call_completion_model(&self, prompt: &Prompt) -> Result<PromptResult, ToolError> {
        self.call_chat_model(prompt).await
    }
}

/// Scripts run by local interpreters, parameters exported as environment variables
#[derive(Debug, Clone)]
pub struct SubprocessScriptTools {
    timeout_secs: u64,
}

impl SubprocessScriptTools {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn interpreter(language: ScriptLanguage) -> Option<(&'static str, &'static str)> {
        match language {
            ScriptLanguage::Bash => Some(("bash", "-c")),
            ScriptLanguage::Python => Some(("python3", "-c")),
            ScriptLanguage::Javascript => Some(("node", "-e")),
            ScriptLanguage::Typescript => None,
        }
    }
}

impl Default for SubprocessScriptTools {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptExecutionTools for SubprocessScriptTools {
    fn supports(&self, language: ScriptLanguage) -> bool {
        Self::interpreter(language).is_some()
    }

    async fn execute(
        &self,
        language: ScriptLanguage,
        script: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        let (program, flag) = Self::interpreter(language)
            .ok_or_else(|| ToolError::Unsupported(format!("Script language {}", language)))?;

        debug!("Running {} script with {} parameters", language, parameters.len());

        let mut command = Command::new(program);
        command.arg(flag).arg(script).envs(parameters);

        let output = run_command(command, program, self.timeout_secs)
            .await
            .map_err(|error| match error {
                ToolError::Api(message) => ToolError::Script(message),
                other => other,
            })?;

        Ok(output.strip_suffix('\n').unwrap_or(&output).to_string())
    }
}
