//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline file (YAML or JSON)
    #[arg(short, long)]
    pub file: String,

    /// Input parameters (key=value)
    #[arg(short, long, value_parser = parse_key_value)]
    pub input: Vec<(String, String)>,

    /// Maximum number of tasks running at the same time
    #[arg(long, default_value_t = 5)]
    pub max_parallel: usize,

    /// Maximum number of attempts per task
    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,

    /// Command that answers prompts, it gets the prompt as its last argument
    #[arg(long)]
    pub llm_command: Option<String>,

    /// Print the execution report as JSON
    #[arg(long)]
    pub report: bool,
}

/// Validate a pipeline file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline file (YAML or JSON)
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
