//! Analyze Command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sitecheck_common::SitecheckConfig;
use sitecheck_triage::{AnalysisTarget, IncidentAnalyzer};

use crate::output::{print_info, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Analyze a single incident file
    #[arg(long, conflicts_with = "incidents_dir")]
    pub incident: Option<PathBuf>,

    /// Analyze every incident file in a directory (defaults to the incidents directory)
    #[arg(long)]
    pub incidents_dir: Option<PathBuf>,

    /// Never call the completion service, even when a credential is set
    #[arg(long)]
    pub offline: bool,
}

pub async fn execute(args: AnalyzeArgs, config: &SitecheckConfig, format: OutputFormat) -> Result<()> {
    let target = match (args.incident, args.incidents_dir) {
        (Some(file), _) => AnalysisTarget::File(file),
        (None, Some(dir)) => AnalysisTarget::Directory(dir),
        (None, None) => AnalysisTarget::Directory(config.paths.incidents_dir()),
    };

    let analyzer = if args.offline {
        IncidentAnalyzer::heuristic_only()
    } else {
        IncidentAnalyzer::from_env(&config.llm)?
    };

    if format == OutputFormat::Table {
        if analyzer.uses_completion_service() {
            print_info(&format!("Sending incidents to {} ({})", config.llm.endpoint, config.llm.model));
        } else {
            print_info("No API key set: heuristic analysis only");
        }
    }

    let outcome = analyzer.analyze(&target).await?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "written": outcome.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "failed": outcome
                    .failed
                    .iter()
                    .map(|(path, reason)| serde_json::json!({"incident": path.display().to_string(), "error": reason}))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            for path in &outcome.written {
                print_success(&format!("Analysis written to {}", path.display()));
            }
            for (path, reason) in &outcome.failed {
                print_warning(&format!("Could not analyze {}: {}", path.display(), reason));
            }
            if outcome.written.is_empty() && outcome.failed.is_empty() {
                print_info("No incident JSON files found");
            }
        }
    }

    Ok(())
}
