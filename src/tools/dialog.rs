//! Dialog tasks answered on the terminal

use super::{DialogOptions, ToolError, UserInterfaceTools};
use async_trait::async_trait;
use console::{style, Term};

/// Asks the question on stderr and reads one line from the terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalDialogTools;

impl TerminalDialogTools {
    pub fn new() -> Self {
        Self
    }
}

/// Use the default when the user enters nothing
fn resolve_answer(answer: &str, default_value: Option<&str>) -> String {
    let answer = answer.trim();
    match default_value {
        Some(default) if answer.is_empty() => default.to_string(),
        _ => answer.to_string(),
    }
}

#[async_trait]
impl UserInterfaceTools for TerminalDialogTools {
    async fn prompt_dialog(&self, options: &DialogOptions) -> Result<String, ToolError> {
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let term = Term::stderr();
            let io_error = |e: std::io::Error| ToolError::Internal(format!("Terminal error: {}", e));

            term.write_line(&format!("{}", style(&options.prompt_title).bold().cyan()))
                .map_err(io_error)?;
            term.write_line(&options.prompt_message).map_err(io_error)?;

            let hint = options
                .default_value
                .as_deref()
                .or(options.placeholder.as_deref())
                .unwrap_or("");
            term.write_str(&format!("{} ", style(format!("[{}] >", hint)).dim()))
                .map_err(io_error)?;

            let answer = term.read_line().map_err(io_error)?;
            Ok(resolve_answer(&answer, options.default_value.as_deref()))
        })
        .await
        .map_err(|e| ToolError::Internal(format!("Dialog task panicked: {}", e)))?
    }
}
