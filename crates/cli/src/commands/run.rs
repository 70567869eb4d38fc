//! Run Command
//!
//! Runs the Playwright suite and records the outcome in the run log.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::warn;

use sitecheck_common::{extract_version, SitecheckConfig};
use sitecheck_triage::{ListSummary, PlaywrightConfig, PlaywrightReport, PlaywrightRunner, RunLog, RunSession};

use crate::output::{print_item, print_warning, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Directory holding the Playwright project
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Launcher used to invoke Playwright
    #[arg(long, default_value = "npx")]
    pub launcher: String,

    /// Arguments passed through to `playwright test`
    #[arg(last = true)]
    pub playwright_args: Vec<String>,
}

/// Returns Playwright's exit code
pub async fn execute(args: RunArgs, config: &SitecheckConfig, format: OutputFormat) -> Result<i32> {
    let report_path = args.project_dir.join(&config.paths.report);

    let runner = PlaywrightRunner::new(PlaywrightConfig {
        launcher: args.launcher,
        report_path: report_path.clone(),
        working_dir: args.project_dir,
        extra_args: args.playwright_args,
    })?;

    let log = RunLog::new(&config.paths.run_log);
    let mut session = RunSession::begin().with_software_version(extract_version(&config.paths.version_file));

    let output = runner.run().await?;
    session.set_exit_code(output.exit_code);
    session.set_output(&output.stdout, &output.stderr);

    match PlaywrightReport::load(&report_path) {
        Ok(report) => super::ingest(&mut session, &report, format),
        Err(e) => {
            warn!("{}", e);
            print_warning("JSON report unavailable; counts recovered from the console output");
            session.set_fallback_counts(ListSummary::parse(&output.stdout).counts());
        }
    }

    let record = session.end(&log);
    print_item(&record, format);

    Ok(output.exit_code)
}
