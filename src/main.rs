use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use taskbook::cli::commands::{RunCommand, ValidateCommand};
use taskbook::cli::output::*;
use taskbook::cli::{Cli, Command};
use taskbook::execution::{prepare_pipeline, ExecutionEngine, ExecutionEvent};
use taskbook::tools::{CommandLlmTools, ExecutionTools, SubprocessScriptTools, TerminalDialogTools};
use taskbook::{ExecutionOptions, Pipeline};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let pipeline = Pipeline::from_file(&cmd.file).context("Failed to load pipeline")?;

    println!("{} Loaded pipeline: {}", INFO, style(&pipeline.title).bold());

    let options = ExecutionOptions::default()
        .with_max_parallel_count(cmd.max_parallel)
        .with_max_execution_attempts(cmd.max_attempts);

    let mut tools = ExecutionTools::new()
        .with_script(Arc::new(SubprocessScriptTools::new()))
        .with_user_interface(Arc::new(TerminalDialogTools::new()));
    if let Some(command_line) = &cmd.llm_command {
        let llm = CommandLlmTools::from_command_line(command_line)
            .context("Invalid LLM command")?;
        tools = tools.with_llm(Arc::new(llm));
    }

    let pipeline = prepare_pipeline(&pipeline, &options)
        .await
        .context("Failed to prepare pipeline")?;

    let inputs: HashMap<String, String> = cmd.input.iter().cloned().collect();
    for (key, value) in &inputs {
        println!(
            "{} Input: {} = {}",
            INFO,
            style(key).cyan(),
            style(format_output(value, 1)).dim()
        );
    }

    let engine = ExecutionEngine::new(tools, options);
    let progress = create_progress_bar(pipeline.tasks.len());
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event));
            match event {
                ExecutionEvent::TaskCompleted { .. }
                | ExecutionEvent::TaskFailed { .. }
                | ExecutionEvent::TaskSkipped { .. } => bar.inc(1),
                ExecutionEvent::TaskStarted { task_name, .. } => bar.set_message(task_name),
                _ => {}
            }
        })
        .await;

    println!();
    let result = engine.execute_pipeline(&pipeline, inputs).await;
    progress.finish_and_clear();

    let mut outputs: Vec<_> = result.output_parameters.iter().collect();
    outputs.sort();
    for (name, value) in outputs {
        println!("\n{} {}", style("Output").bold(), style(name).cyan());
        println!("{}", format_output(value, 20));
    }

    for warning in &result.warnings {
        println!("{} {}", WARN, style(warning).yellow());
    }

    if cmd.report {
        let report = serde_json::to_string_pretty(&result.execution_report)?;
        println!("\n{}", report);
    }

    if result.is_successful {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.title).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {} {}",
            CROSS,
            style(&pipeline.title).bold(),
            style("failed").red(),
            style(format!(
                "({:.0}% of tasks finished, {} failed)",
                result.state.progress() * 100.0,
                result.state.failed_tasks
            ))
            .dim()
        );
        for pipeline_error in &result.errors {
            error!("{}", pipeline_error);
            println!("  {}", style(pipeline_error).red());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match Pipeline::from_file(&cmd.file) {
        Ok(pipeline) => {
            println!("{} Pipeline is valid!", CHECK);
            println!("  Title: {}", style(&pipeline.title).bold());
            println!("  Tasks: {}", style(pipeline.tasks.len()).cyan());
            println!(
                "  Inputs: {}",
                style(pipeline.input_parameter_names().join(", ")).cyan()
            );
            println!(
                "  Outputs: {}",
                style(pipeline.output_parameter_names().join(", ")).cyan()
            );
            println!(
                "  Order: {}",
                style(pipeline.execution_order().join(" -> ")).dim()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&pipeline)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
