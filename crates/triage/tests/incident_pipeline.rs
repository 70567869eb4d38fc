//! Incident packaging tests
//!
//! Builds a synthetic artifacts tree and runs the collector over it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use sitecheck_common::{Incident, SitecheckConfig};
use sitecheck_triage::incident::FALLBACK_ORIGIN;
use sitecheck_triage::{CollectMode, IncidentBuilder, TriageError};

fn config_for(root: &Path) -> SitecheckConfig {
    let mut config = SitecheckConfig::default();
    config.paths.artifacts_dir = root.join("artifacts");
    config.paths.results_dir = root.join("test-results");
    config.paths.report = root.join("artifacts/playwright-results.json");
    config.paths.run_log = root.join("test-results/aggregate-results.json");
    config.base_url = Some("https://example.test".into());
    config
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"x").unwrap();
}

fn failing_report() -> serde_json::Value {
    json!({
        "suites": [{
            "title": "contact.spec.js",
            "file": "contact.spec.js",
            "specs": [{
                "title": "submits the form",
                "file": "contact.spec.js",
                "line": 30,
                "tests": [{
                    "status": "unexpected",
                    "results": [{
                        "status": "failed",
                        "duration": 30012,
                        "error": {"message": "Timeout 30000ms exceeded"}
                    }]
                }]
            }]
        }]
    })
}

fn read_incident(path: &PathBuf) -> Incident {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_one_incident_per_failure() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let artifacts = &config.paths.artifacts_dir;

    touch(&artifacts.join("contact.spec-submits/test-failed-1.png"));
    touch(&artifacts.join("contact.spec-submits/video.webm"));
    touch(&artifacts.join("contact.spec-submits/trace.zip"));
    touch(&artifacts.join("home.spec-hero/test-failed-1.png"));
    fs::write(&config.paths.report, failing_report().to_string()).unwrap();

    // A second, hand-written report in the results dir
    fs::create_dir_all(&config.paths.results_dir).unwrap();
    fs::write(
        config.paths.results_dir.join("extra.json"),
        json!({"items": [{"status": "error", "title": "api down", "file": "api.spec.js", "err": "ECONNREFUSED"}]})
            .to_string(),
    )
    .unwrap();
    // Unparsable files are skipped
    fs::write(config.paths.results_dir.join("broken.json"), "{").unwrap();

    let outcome = IncidentBuilder::new(&config).collect().unwrap();
    assert_eq!(outcome.mode, CollectMode::Failures);
    assert_eq!(outcome.written.len(), 2);

    let incidents: Vec<Incident> = outcome.written.iter().map(read_incident).collect();
    let contact = incidents
        .iter()
        .find(|i| i.file.as_deref() == Some("contact.spec.js"))
        .unwrap();

    assert_eq!(contact.title.as_deref(), Some("submits the form"));
    assert_eq!(contact.test_id.as_deref(), Some("contact.spec.js:submits the form"));
    assert!(contact.error.contains("Timeout 30000ms exceeded"));
    assert_eq!(contact.screenshots.len(), 1);
    assert_eq!(contact.videos.len(), 1);
    assert_eq!(contact.traces.len(), 1);
    assert_eq!(contact.metadata.base_url.as_deref(), Some("https://example.test"));
    assert!(contact.metadata.source_json.is_some());

    let api = incidents.iter().find(|i| i.file.as_deref() == Some("api.spec.js")).unwrap();
    assert_eq!(api.error, "ECONNREFUSED");
    assert!(api.screenshots.is_empty());
}

#[test]
fn test_run_log_failures_become_incidents() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    fs::create_dir_all(&config.paths.artifacts_dir).unwrap();
    fs::create_dir_all(config.paths.run_log.parent().unwrap()).unwrap();
    fs::write(
        &config.paths.run_log,
        json!([{
            "runAt": "2024-03-01T12:00:00.000Z",
            "endAt": "2024-03-01T12:00:05.000Z",
            "durationMs": 5000,
            "total": 1,
            "counts": {"passed": 0, "failed": 1, "skipped": 0, "timedOut": 0, "unknown": 0},
            "tests": [{
                "titlePath": ["contact", "submits"],
                "title": "submits",
                "file": "contact.spec.js",
                "status": "failed",
                "errors": ["expected visible"]
            }]
        }])
        .to_string(),
    )
    .unwrap();

    let outcome = IncidentBuilder::new(&config).collect().unwrap();
    assert_eq!(outcome.mode, CollectMode::Failures);
    assert_eq!(outcome.written.len(), 1);

    let incident = read_incident(&outcome.written[0]);
    assert_eq!(incident.test_id.as_deref(), Some("contact.spec.js:submits"));
    assert!(incident.error.contains("expected visible"));
}

#[test]
fn test_rerun_ignores_previous_incidents() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    touch(&config.paths.artifacts_dir.join("contact.spec-submits/test-failed-1.png"));
    fs::write(&config.paths.report, failing_report().to_string()).unwrap();

    let builder = IncidentBuilder::new(&config);
    let first = builder.collect().unwrap();
    let second = builder.collect().unwrap();

    assert_eq!(first.written.len(), 1);
    assert_eq!(second.written.len(), 1);
    assert_ne!(first.written[0], second.written[0]);
}

#[test]
fn test_fallback_by_directory() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let artifacts = &config.paths.artifacts_dir;

    touch(&artifacts.join("run-a/shot.png"));
    touch(&artifacts.join("run-a/console.txt"));
    touch(&artifacts.join("run-b/page.html"));
    touch(&artifacts.join("run-c/notes.md"));
    fs::write(&config.paths.report, json!({"suites": []}).to_string()).unwrap();

    let outcome = IncidentBuilder::new(&config).collect().unwrap();
    assert_eq!(outcome.mode, CollectMode::Fallback);
    assert_eq!(outcome.written.len(), 2);

    let mut incidents: Vec<Incident> = outcome.written.iter().map(read_incident).collect();
    incidents.sort_by(|a, b| a.test_id.cmp(&b.test_id));

    assert_eq!(incidents[0].test_id.as_deref(), Some("auto:run-a"));
    assert_eq!(incidents[0].title.as_deref(), Some("Artifacts from run-a"));
    assert_eq!(incidents[0].error, "");
    assert_eq!(incidents[0].screenshots.len(), 1);
    assert_eq!(incidents[0].logs.len(), 1);
    assert_eq!(incidents[0].metadata.generated_from.as_deref(), Some(FALLBACK_ORIGIN));
    assert_eq!(incidents[1].test_id.as_deref(), Some("auto:run-b"));
    assert_eq!(incidents[1].html.len(), 1);
}

#[test]
fn test_nothing_to_pack() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    fs::create_dir_all(&config.paths.artifacts_dir).unwrap();

    let outcome = IncidentBuilder::new(&config).collect().unwrap();
    assert_eq!(outcome.mode, CollectMode::Nothing);
    assert!(outcome.written.is_empty());
}

#[test]
fn test_missing_artifacts_dir() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());

    let err = IncidentBuilder::new(&config).collect().unwrap_err();
    assert!(matches!(err, TriageError::DirectoryNotFound(_)));
    assert!(err.is_missing_input());
}
