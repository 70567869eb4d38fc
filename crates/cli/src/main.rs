//! Sitecheck CLI - Main Entry Point
//!
//! Records Playwright runs, packages failures as incidents, analyzes them
//! and produces CI summaries.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod output;

use commands::{analyze, collect, record, run, summary};
use output::{print_error, LogFormat, OutputFormat};
use sitecheck_common::SitecheckConfig;
use sitecheck_triage::TriageError;

/// Sitecheck - Playwright run recording and failure triage
#[derive(Parser)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "sitecheck.toml", env = "SITECHECK_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Playwright suite and record the run
    Run(run::RunArgs),

    /// Record a finished run from its JSON report
    Record(record::RecordArgs),

    /// Package failures and artifacts as incident files
    Collect(collect::CollectArgs),

    /// Diagnose incident files
    Analyze(analyze::AnalyzeArgs),

    /// Generate the CI test summary
    Summary(summary::SummaryArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::Record(_) => "record",
            Commands::Collect(_) => "collect",
            Commands::Analyze(_) => "analyze",
            Commands::Summary(_) => "summary",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    let config = SitecheckConfig::from_env(&cli.config)?;
    let name = cli.command.name();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, &config, cli.format).await,
        Commands::Record(args) => record::execute(args, &config, cli.format).await.map(|_| 0),
        Commands::Collect(args) => collect::execute(args, &config, cli.format).await.map(|_| 0),
        Commands::Analyze(args) => analyze::execute(args, &config, cli.format).await.map(|_| 0),
        Commands::Summary(args) => summary::execute(args, &config, cli.format).await.map(|_| 0),
    };

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => match e.downcast_ref::<TriageError>() {
            Some(err) if err.is_missing_input() => {
                print_error(&err.to_string());
                let mut command = Cli::command();
                if let Some(sub) = command.find_subcommand_mut(name) {
                    eprintln!("{}", sub.render_usage());
                }
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}
