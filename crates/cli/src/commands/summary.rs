//! Summary Command
//!
//! Condenses the Playwright JSON report into CI summary files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sitecheck_common::SitecheckConfig;
use sitecheck_triage::summary::{self, success_icon};

use crate::output::{print_item, print_success, OutputFormat};

#[derive(Args)]
pub struct SummaryArgs {
    /// Playwright JSON report (defaults to the configured report)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Directory the summary files are written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// File holding the software version line
    #[arg(long)]
    pub version_file: Option<PathBuf>,

    /// CI step-summary file the markdown is appended to
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    pub step_summary: Option<PathBuf>,
}

pub async fn execute(args: SummaryArgs, config: &SitecheckConfig, format: OutputFormat) -> Result<()> {
    let report = args.report.unwrap_or_else(|| config.paths.report.clone());
    let out_dir = args.out_dir.unwrap_or_else(|| config.paths.out_dir.clone());
    let version_file = args.version_file.unwrap_or_else(|| config.paths.version_file.clone());

    let ci = summary::summarize(&report, &version_file)?;
    let files = summary::write_summary(&ci, &out_dir, args.step_summary.as_deref())?;

    print_item(&ci, format);

    if format == OutputFormat::Table {
        print_success(&format!("Generated {}", files.json.display()));
        print_success(&format!("Generated {}", files.markdown.display()));
        if let Some(step) = &files.step_summary {
            print_success(&format!("Appended to {}", step.display()));
        }
        println!("{} Success rate: {}%", success_icon(&ci.success_rate), ci.success_rate);
    }

    Ok(())
}
