//! Playwright runner tests
//!
//! A shell script stands in for `npx` so no Node toolchain is needed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use sitecheck_triage::{ListSummary, PlaywrightConfig, PlaywrightReport, PlaywrightRunner, RunSession, TriageError};

/// Answers `playwright --version`, then fails two tests without writing a report
const CRASHING_LAUNCHER: &str = r#"#!/bin/sh
if [ "$2" = "--version" ]; then
  echo "Version 1.40.0"
  exit 0
fi
echo "Running 2 tests using 1 worker"
echo "  2 failed"
exit 1
"#;

fn install_launcher(dir: &Path, script: &str) -> String {
    let path = dir.join("fake-npx");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn test_crashed_run_does_not_reuse_previous_report() {
    let tmp = TempDir::new().unwrap();
    let report_path = tmp.path().join("artifacts/playwright-results.json");
    fs::create_dir_all(report_path.parent().unwrap()).unwrap();
    fs::write(
        &report_path,
        json!({"suites": [{"title": "old", "specs": [{"title": "stale", "tests": [
            {"status": "expected", "results": [{"status": "passed", "duration": 5}]}
        ]}]}]})
        .to_string(),
    )
    .unwrap();

    let runner = PlaywrightRunner::new(PlaywrightConfig {
        launcher: install_launcher(tmp.path(), CRASHING_LAUNCHER),
        report_path: report_path.clone(),
        working_dir: tmp.path().to_path_buf(),
        extra_args: Vec::new(),
    })
    .unwrap();

    let output = runner.run().await.unwrap();
    assert_eq!(output.exit_code, 1);
    assert!(!report_path.exists());

    let err = PlaywrightReport::load(&report_path).unwrap_err();
    assert!(matches!(err, TriageError::ReportNotFound(_)));

    let mut session = RunSession::begin();
    session.set_fallback_counts(ListSummary::parse(&output.stdout).counts());
    let run = session.finish();
    assert_eq!(run.total, 2);
    assert_eq!(run.counts.failed, 2);
    assert_eq!(run.counts.passed, 0);
}

#[test]
fn test_missing_launcher_is_reported() {
    let tmp = TempDir::new().unwrap();
    let result = PlaywrightRunner::new(PlaywrightConfig {
        launcher: tmp.path().join("no-such-npx").display().to_string(),
        working_dir: tmp.path().to_path_buf(),
        ..Default::default()
    });
    assert!(matches!(result, Err(TriageError::Playwright(_))));
}
