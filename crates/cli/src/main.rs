//! Advisor Assistant CLI
//!
//! Main entry point for the `advisor` command-line tool: orchestrated
//! question answering over enterprise documents, the customer dataset and
//! external research, gated by compliance validation.

mod commands;

use advisor_core::{config::AppConfig, logging, AppError};
use clap::{Parser, Subcommand};
use commands::{AskCommand, CheckCommand, InsightsCommand, KnowledgeCommand, ServeCommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// Advisor Assistant - compliant answers for financial advisors
#[derive(Parser, Debug)]
#[command(name = "advisor")]
#[command(about = "Compliant, cited answers for financial advisors", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ADVISOR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ADVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider used for research and llm routing
    #[arg(short, long, global = true, env = "ADVISOR_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ADVISOR_MODEL")]
    model: Option<String>,

    /// Reasoning engine (keyword, llm)
    #[arg(long, global = true, env = "ADVISOR_ROUTER")]
    router: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question
    Ask(AskCommand),

    /// Knowledge base management
    Knowledge(KnowledgeCommand),

    /// Run a structured query over the customer dataset
    Insights(InsightsCommand),

    /// Validate a draft answer against the compliance rules
    Check(CheckCommand),

    /// Serve the assistant over HTTP
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error [{}]: {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) =
        logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)
    {
        eprintln!("error [{}]: {}", e.code(), e);
        return ExitCode::FAILURE;
    }

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {} ({})", config.provider, config.model);
    tracing::debug!("Router: {}", config.orchestrator.router);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Knowledge(_) => "knowledge",
        Commands::Insights(_) => "insights",
        Commands::Check(_) => "check",
        Commands::Serve(_) => "serve",
    };
    let span = tracing::info_span!("command", name = command_name);
    let result = run(&cli.command, &config).instrument(span).await;

    match result {
        Ok(()) => {
            tracing::info!("Command completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::code)
                .unwrap_or("INTERNAL_ERROR");
            tracing::error!(code, "Command failed: {:#}", e);
            eprintln!("error [{}]: {:#}", code, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &Commands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Ask(cmd) => cmd.execute(config).await,
        Commands::Knowledge(cmd) => cmd.execute(config).await,
        Commands::Insights(cmd) => cmd.execute(config).await,
        Commands::Check(cmd) => cmd.execute(config).await,
        Commands::Serve(cmd) => cmd.execute(config).await,
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        None,
        None,
        cli.provider.clone(),
        cli.model.clone(),
        cli.log_level.clone(),
        cli.verbose,
        cli.no_color,
    );
    if let Some(router) = &cli.router {
        config.orchestrator.router = router.clone();
    }
    config.validate()?;
    config.ensure_advisor_dir()?;
    Ok(config)
}
