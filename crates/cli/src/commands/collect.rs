//! Collect Command
//!
//! Packages failures and their artifacts as incident files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sitecheck_common::SitecheckConfig;
use sitecheck_triage::{CollectMode, IncidentBuilder};

use crate::output::{print_info, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct CollectArgs {
    /// Artifacts directory to scan
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

pub async fn execute(args: CollectArgs, config: &SitecheckConfig, format: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    if let Some(artifacts) = args.artifacts {
        config.paths.artifacts_dir = artifacts;
    }

    let outcome = IncidentBuilder::new(&config).collect()?;

    let mode = match outcome.mode {
        CollectMode::Failures => "failures",
        CollectMode::Fallback => "fallback",
        CollectMode::Nothing => "nothing",
    };

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "mode": mode,
                "incidentsDir": outcome.incidents_dir.display().to_string(),
                "written": outcome.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            match outcome.mode {
                CollectMode::Nothing => print_warning("No failures or artifacts found to pack"),
                CollectMode::Fallback => print_info("No failures found in reports; packed artifacts by directory"),
                CollectMode::Failures => {}
            }
            for path in &outcome.written {
                println!("  {}", path.display());
            }
            if !outcome.written.is_empty() {
                print_success(&format!(
                    "Wrote {} incident(s) to {}",
                    outcome.written.len(),
                    outcome.incidents_dir.display()
                ));
            }
        }
    }

    Ok(())
}
