//! Playwright JSON reporter output
//!
//! Only the parts of the report the pipeline reads are modelled; every field
//! is optional so that older or partial reports still load.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use sitecheck_common::TestStatus;

use crate::error::{TriageError, TriageResult};
use crate::recorder::CompletedTest;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaywrightReport {
    pub suites: Vec<Suite>,
    pub stats: Option<ReportStats>,
    pub errors: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportStats {
    pub start_time: Option<DateTime<Utc>>,
    pub duration: f64,
    pub expected: usize,
    pub unexpected: usize,
    pub flaky: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Suite {
    pub title: String,
    pub file: Option<String>,
    pub specs: Vec<Spec>,
    pub suites: Vec<Suite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Spec {
    pub title: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub tests: Vec<ReportTest>,
}

/// One test of a spec, per project
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportTest {
    pub project_name: Option<String>,
    /// `expected`, `unexpected`, `flaky` or `skipped`
    pub status: Option<String>,
    pub results: Vec<ReportResult>,
}

impl ReportTest {
    /// The most recent attempt
    pub fn last_result(&self) -> Option<&ReportResult> {
        self.results.last()
    }
}

/// One attempt (the first run or a retry)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportResult {
    /// `passed`, `failed`, `timedOut`, `skipped` or `interrupted`
    pub status: Option<String>,
    pub duration: f64,
    pub retry: u32,
    pub error: Option<Value>,
    pub errors: Vec<Value>,
    pub stdout: Vec<Value>,
    pub stderr: Vec<Value>,
}

/// A test together with the suite titles leading to it
#[derive(Debug, Clone)]
pub struct TestEntry<'a> {
    pub title_path: Vec<String>,
    pub spec: &'a Spec,
    pub test: &'a ReportTest,
}

impl PlaywrightReport {
    pub fn from_json(json: &str) -> TriageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a report; a missing file is `ReportNotFound`
    pub fn load(path: &Path) -> TriageResult<Self> {
        if !path.is_file() {
            return Err(TriageError::ReportNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Flatten the suite tree, depth first, specs before nested suites
    pub fn tests(&self) -> Vec<TestEntry<'_>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        walk_suites(&self.suites, &mut path, &mut out);
        out
    }

    /// Convert every test's final attempt into a recorder input
    pub fn completed_tests(&self) -> Vec<CompletedTest> {
        self.tests().into_iter().map(|entry| entry.to_completed()).collect()
    }
}

fn walk_suites<'a>(suites: &'a [Suite], path: &mut Vec<String>, out: &mut Vec<TestEntry<'a>>) {
    for suite in suites {
        let pushed = !suite.title.is_empty();
        if pushed {
            path.push(suite.title.clone());
        }

        for spec in &suite.specs {
            for test in &spec.tests {
                let mut title_path = path.clone();
                title_path.push(spec.title.clone());
                out.push(TestEntry { title_path, spec, test });
            }
        }
        walk_suites(&suite.suites, path, out);

        if pushed {
            path.pop();
        }
    }
}

impl TestEntry<'_> {
    pub fn to_completed(&self) -> CompletedTest {
        let last = self.test.last_result();

        let status = match (last.and_then(|r| r.status.as_deref()), self.test.status.as_deref()) {
            (Some(s), _) => TestStatus::parse(s),
            (None, Some("skipped")) => TestStatus::Skipped,
            _ => TestStatus::Unknown,
        };

        let (errors, stdout, stderr, duration_ms) = match last {
            Some(r) => {
                let mut errors = r.errors.clone();
                if errors.is_empty() {
                    errors.extend(r.error.clone());
                }
                (
                    errors,
                    r.stdout.iter().filter_map(output_text).collect(),
                    r.stderr.iter().filter_map(output_text).collect(),
                    r.duration.max(0.0) as u64,
                )
            }
            None => (Vec::new(), Vec::new(), Vec::new(), 0),
        };

        CompletedTest {
            title_path: self.title_path.clone(),
            title: self.spec.title.clone(),
            file: self.spec.file.clone(),
            line: self.spec.line,
            status,
            duration_ms,
            errors,
            stdout,
            stderr,
        }
    }
}

/// Captured output chunks are `{"text": ...}` or `{"buffer": <base64>}`
fn output_text(chunk: &Value) -> Option<String> {
    match chunk {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("buffer"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
      "stats": { "startTime": "2024-05-01T10:00:00.000Z", "duration": 4200.5, "expected": 1, "unexpected": 1 },
      "suites": [{
        "title": "contact.spec.js",
        "file": "contact.spec.js",
        "specs": [{
          "title": "loads the page",
          "file": "contact.spec.js",
          "line": 8,
          "tests": [{ "status": "expected", "results": [{ "status": "passed", "duration": 812 }] }]
        }],
        "suites": [{
          "title": "form",
          "specs": [{
            "title": "submits",
            "file": "contact.spec.js",
            "line": 30,
            "tests": [{
              "status": "unexpected",
              "results": [
                { "status": "failed", "duration": 100, "errors": [{ "message": "first" }] },
                { "status": "failed", "duration": 120, "error": { "message": "Timeout 5000ms exceeded" },
                  "stdout": [{ "text": "hello\n" }] }
              ]
            }]
          }]
        }]
      }]
    }"#;

    #[test]
    fn test_flatten_title_paths() {
        let report = PlaywrightReport::from_json(REPORT).unwrap();
        let tests = report.tests();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].title_path, vec!["contact.spec.js", "loads the page"]);
        assert_eq!(tests[1].title_path, vec!["contact.spec.js", "form", "submits"]);
        assert_eq!(report.stats.unwrap().duration, 4200.5);
    }

    #[test]
    fn test_completed_uses_last_attempt() {
        let report = PlaywrightReport::from_json(REPORT).unwrap();
        let completed = report.completed_tests();

        assert_eq!(completed[0].status, TestStatus::Passed);
        assert_eq!(completed[0].duration_ms, 812);

        let failed = &completed[1];
        assert_eq!(failed.status, TestStatus::Failed);
        assert_eq!(failed.duration_ms, 120);
        assert_eq!(failed.line, Some(30));
        assert_eq!(failed.errors.len(), 1);
        assert_eq!(failed.errors[0]["message"], "Timeout 5000ms exceeded");
        assert_eq!(failed.stdout, vec!["hello\n".to_string()]);
    }

    #[test]
    fn test_missing_report() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlaywrightReport::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, TriageError::ReportNotFound(_)));
    }

    #[test]
    fn test_skipped_without_results() {
        let report = PlaywrightReport::from_json(
            r#"{"suites":[{"title":"a","specs":[{"title":"b","tests":[{"status":"skipped","results":[]}]}]}]}"#,
        )
        .unwrap();
        assert_eq!(report.completed_tests()[0].status, TestStatus::Skipped);
    }
}
