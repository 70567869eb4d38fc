//! CI summary generation from a Playwright JSON report

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use sitecheck_common::{extract_version, CiCounts, CiSummary};

use crate::error::TriageResult;
use crate::report::{PlaywrightReport, ReportTest};

pub const SUMMARY_JSON: &str = "ci-test-summary.json";
pub const SUMMARY_MARKDOWN: &str = "ci-test-summary.md";

/// Bucket a test lands in for the CI summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiOutcome {
    Passed,
    Failed,
    Flaky,
    Interrupted,
    TimedOut,
    Skipped,
}

/// Classify a test; the first matching rule wins and unknown shapes count as failed
pub fn classify(test: &ReportTest) -> CiOutcome {
    let status = test.status.as_deref();
    let last = test.last_result().and_then(|r| r.status.as_deref());

    if status == Some("flaky") {
        CiOutcome::Flaky
    } else if last == Some("timedOut") {
        CiOutcome::TimedOut
    } else if last == Some("interrupted") {
        CiOutcome::Interrupted
    } else if status == Some("skipped") || last == Some("skipped") {
        CiOutcome::Skipped
    } else if status == Some("unexpected") || last == Some("failed") {
        CiOutcome::Failed
    } else if status == Some("expected") || last == Some("passed") {
        CiOutcome::Passed
    } else {
        CiOutcome::Failed
    }
}

pub fn compute_counts(report: &PlaywrightReport) -> CiCounts {
    let mut counts = CiCounts::default();
    for entry in report.tests() {
        counts.total += 1;
        match classify(entry.test) {
            CiOutcome::Passed => counts.passed += 1,
            CiOutcome::Failed => counts.failed += 1,
            CiOutcome::Flaky => counts.flaky += 1,
            CiOutcome::Interrupted => counts.interrupted += 1,
            CiOutcome::TimedOut => counts.timed_out += 1,
            CiOutcome::Skipped => counts.skipped += 1,
        }
    }
    counts
}

/// Traffic light for a success rate: green from 90%, yellow from 70%
pub fn success_icon(success_rate: &str) -> &'static str {
    let rate: f64 = success_rate.parse().unwrap_or(0.0);
    if rate >= 90.0 {
        "🟢"
    } else if rate >= 70.0 {
        "🟡"
    } else {
        "🔴"
    }
}

pub fn render_markdown(summary: &CiSummary) -> String {
    let c = &summary.counts;
    [
        "# CI Test Summary".to_string(),
        String::new(),
        format!("- Software version: {}", summary.software_version),
        format!("- Generated at: {}", summary.run_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        format!("- Source: {}", summary.source_file),
        String::new(),
        "| Metric | Count |".to_string(),
        "|---|---:|".to_string(),
        format!("| ✅ Passed | {} |", c.passed),
        format!("| ❌ Failed | {} |", c.failed),
        format!("| 🔁 Flaky | {} |", c.flaky),
        format!("| ⛔ Interrupted | {} |", c.interrupted),
        format!("| ⏱️ Timed out | {} |", c.timed_out),
        format!("| ⏭️ Skipped | {} |", c.skipped),
        format!("| 📊 Total | {} |", c.total),
        String::new(),
        format!("- {} Success rate: **{}%**", success_icon(&summary.success_rate), summary.success_rate),
    ]
    .join("\n")
}

/// Summarize the report at `report_path`. Only a missing report is an error.
pub fn summarize(report_path: &Path, version_file: &Path) -> TriageResult<CiSummary> {
    let report = PlaywrightReport::load(report_path)?;
    let counts = compute_counts(&report);

    Ok(CiSummary {
        software_version: extract_version(version_file),
        run_at: chrono::Utc::now(),
        source_file: display_relative(report_path),
        success_rate: counts.success_rate(),
        counts,
    })
}

/// Paths written by [`write_summary`]
#[derive(Debug, Clone)]
pub struct SummaryFiles {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub step_summary: Option<PathBuf>,
}

/// Write the JSON and markdown summaries into `out_dir`, and append the
/// markdown to `step_summary` when given
pub fn write_summary(summary: &CiSummary, out_dir: &Path, step_summary: Option<&Path>) -> TriageResult<SummaryFiles> {
    std::fs::create_dir_all(out_dir)?;

    let json = out_dir.join(SUMMARY_JSON);
    let markdown = out_dir.join(SUMMARY_MARKDOWN);
    let rendered = render_markdown(summary);

    std::fs::write(&json, serde_json::to_string_pretty(summary)?)?;
    std::fs::write(&markdown, &rendered)?;
    info!("Generated {}", json.display());
    info!("Generated {}", markdown.display());

    let step_summary = match step_summary {
        Some(target) => {
            let mut file = OpenOptions::new().create(true).append(true).open(target)?;
            writeln!(file, "{}", rendered)?;
            Some(target.to_path_buf())
        }
        None => None,
    };

    Ok(SummaryFiles {
        json,
        markdown,
        step_summary,
    })
}

/// Path relative to the working directory with forward slashes, when possible
fn display_relative(path: &Path) -> String {
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| {
            let absolute = if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };
            absolute.strip_prefix(&cwd).map(Path::to_path_buf).ok()
        })
        .unwrap_or_else(|| {
            warn!("{} is outside the working directory", path.display());
            path.to_path_buf()
        });
    relative.display().to_string().replace('\\', "/")
}
