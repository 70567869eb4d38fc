//! Record Command
//!
//! Replays a finished run's JSON report into the run log.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use tracing::debug;

use sitecheck_common::{extract_version, SitecheckConfig};
use sitecheck_triage::{PlaywrightReport, RunLog, RunSession};

use crate::output::{print_item, OutputFormat};

#[derive(Args)]
pub struct RecordArgs {
    /// Playwright JSON report to ingest (defaults to the configured report)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Run log to append to
    #[arg(long)]
    pub run_log: Option<PathBuf>,
}

pub async fn execute(args: RecordArgs, config: &SitecheckConfig, format: OutputFormat) -> Result<()> {
    let report_path = args.report.unwrap_or_else(|| config.paths.report.clone());
    let report = PlaywrightReport::load(&report_path)?;
    debug!("Loaded {}", report_path.display());

    let log = RunLog::new(args.run_log.unwrap_or_else(|| config.paths.run_log.clone()));

    let stats = report.stats.clone().unwrap_or_default();
    let started = stats.start_time.unwrap_or_else(Utc::now);
    let ended = started + Duration::milliseconds(stats.duration.max(0.0) as i64);

    let mut session = RunSession::begin_at(started).with_software_version(extract_version(&config.paths.version_file));
    super::ingest(&mut session, &report, format);

    let record = session.end_at(ended, &log);
    print_item(&record, format);

    Ok(())
}
