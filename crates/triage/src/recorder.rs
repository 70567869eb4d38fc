//! Run recording into the append-only run log
//!
//! A [`RunSession`] accumulates one [`TestRecord`] per finished test and is
//! turned into a [`RunRecord`] at the end of the run. The [`RunLog`] persists
//! those records with a read-merge-append cycle; it never fails on a missing
//! or corrupt log and never lets a write failure escape to the caller.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use sitecheck_common::{OutcomeCounts, RunRecord, TestRecord, TestStatus};

use crate::error::TriageResult;

/// Tail kept from the runner's stdout/stderr
pub const SNIPPET_CHARS: usize = 2000;

/// A finished test case as handed over by the runner
#[derive(Debug, Clone, Default)]
pub struct CompletedTest {
    pub title_path: Vec<String>,
    pub title: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub status: TestStatus,
    pub duration_ms: u64,
    /// Error objects (`{message, ...}`) or plain strings
    pub errors: Vec<Value>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CompletedTest {
    fn into_record(self) -> TestRecord {
        let title_path = if self.title_path.is_empty() {
            vec![self.title.clone()]
        } else {
            self.title_path
        };

        TestRecord {
            title_path,
            title: self.title,
            file: self.file,
            line: self.line,
            status: self.status,
            duration: self.duration_ms,
            errors: self.errors.iter().filter_map(error_message).collect(),
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Reduce an error value to its message text, or its string form
pub fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(m)) if !m.is_empty() => Some(m.clone()),
            _ => map
                .get("value")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| Some(error.to_string())),
        },
        other => Some(other.to_string()),
    }
}

/// In-memory state of one test-execution session
#[derive(Debug, Clone)]
pub struct RunSession {
    started_at: DateTime<Utc>,
    tests: Vec<TestRecord>,
    software_version: Option<String>,
    exit_code: Option<i32>,
    stdout_snippet: Option<String>,
    stderr_snippet: Option<String>,
    fallback_counts: Option<OutcomeCounts>,
}

impl RunSession {
    /// Start a session now
    pub fn begin() -> Self {
        Self::begin_at(Utc::now())
    }

    /// Start a session with an explicit start time (replaying a finished run)
    pub fn begin_at(started_at: DateTime<Utc>) -> Self {
        debug!("Run session started at {}", started_at);
        Self {
            started_at,
            tests: Vec::new(),
            software_version: None,
            exit_code: None,
            stdout_snippet: None,
            stderr_snippet: None,
            fallback_counts: None,
        }
    }

    pub fn with_software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = Some(version.into());
        self
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    /// Keep the tail of the runner's output streams
    pub fn set_output(&mut self, stdout: &str, stderr: &str) {
        self.stdout_snippet = Some(tail(stdout, SNIPPET_CHARS));
        self.stderr_snippet = Some(tail(stderr, SNIPPET_CHARS));
    }

    /// Counts to report when no individual test was recorded, e.g. when the
    /// runner's JSON report is missing and only its console footer survives
    pub fn set_fallback_counts(&mut self, counts: OutcomeCounts) {
        self.fallback_counts = Some(counts);
    }

    /// Record one finished test
    pub fn record(&mut self, test: CompletedTest) -> &TestRecord {
        self.tests.push(test.into_record());
        &self.tests[self.tests.len() - 1]
    }

    pub fn tests(&self) -> &[TestRecord] {
        &self.tests
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Close the session, ending at the current time
    pub fn finish(self) -> RunRecord {
        self.finish_at(Utc::now())
    }

    pub fn finish_at(self, end_at: DateTime<Utc>) -> RunRecord {
        let counts = match self.fallback_counts {
            Some(fallback) if self.tests.is_empty() => fallback,
            _ => OutcomeCounts::tally(self.tests.iter().map(|t| &t.status)),
        };
        let duration_ms = (end_at - self.started_at).num_milliseconds().max(0) as u64;

        RunRecord {
            run_at: self.started_at,
            end_at,
            duration_ms,
            total: counts.sum(),
            counts,
            tests: self.tests,
            software_version: self.software_version,
            exit_code: self.exit_code,
            stdout_snippet: self.stdout_snippet,
            stderr_snippet: self.stderr_snippet,
        }
    }

    /// Finish the session and append it to `log`.
    ///
    /// Persistence failures are logged, never returned.
    pub fn end(self, log: &RunLog) -> RunRecord {
        self.end_at(Utc::now(), log)
    }

    /// [`RunSession::end`] with an explicit end time
    pub fn end_at(self, end_at: DateTime<Utc>, log: &RunLog) -> RunRecord {
        let record = self.finish_at(end_at);
        match log.append(&record) {
            Ok(len) => info!(
                "Appended run with {} tests to {} ({} runs recorded)",
                record.total,
                log.path().display(),
                len
            ),
            Err(e) => error!("Failed to write run log {}: {}", log.path().display(), e),
        }
        record
    }
}

fn tail(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    s.chars().skip(count - max_chars).collect()
}

/// The persistent, append-only sequence of runs
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw log entries.
    ///
    /// A missing file, empty content, malformed JSON or a non-array top level
    /// all read as an empty sequence. Entries are kept verbatim so older
    /// shapes survive the next append untouched.
    pub fn read_entries(&self) -> Vec<Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let content = content.trim();
        if content.is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Value>(content) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!("Run log {} is not a JSON array, starting fresh", self.path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Run log {} is malformed ({}), starting fresh", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Entries that parse as run records
    pub fn records(&self) -> Vec<RunRecord> {
        self.read_entries()
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()
    }

    /// Append `record`, returning the new number of entries
    pub fn append(&self, record: &RunRecord) -> TriageResult<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let _lock = LogLock::acquire(&self.path);

        let mut entries = self.read_entries();
        entries.push(serde_json::to_value(record)?);

        // Readers see either the old or the new log, never a partial one
        let tmp = sidecar_path(&self.path, ".tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&entries)?)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(entries.len())
    }
}

/// Exclusive advisory lock on `<log>.lock`, held until dropped
struct LogLock {
    #[cfg(unix)]
    _flock: Option<nix::fcntl::Flock<File>>,
}

impl LogLock {
    #[cfg(unix)]
    fn acquire(log_path: &Path) -> Self {
        use nix::fcntl::{Flock, FlockArg};

        let lock_path = lock_path(log_path);
        let flock = File::create(&lock_path)
            .map_err(|e| e.to_string())
            .and_then(|file| {
                Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| errno.to_string())
            });

        match flock {
            Ok(flock) => Self { _flock: Some(flock) },
            Err(e) => {
                warn!("Could not lock {}: {}; appending unlocked", lock_path.display(), e);
                Self { _flock: None }
            }
        }
    }

    #[cfg(not(unix))]
    fn acquire(_log_path: &Path) -> Self {
        Self {}
    }
}

fn lock_path(log_path: &Path) -> PathBuf {
    sidecar_path(log_path, ".lock")
}

fn sidecar_path(log_path: &Path, suffix: &str) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(title: &str, status: TestStatus) -> CompletedTest {
        CompletedTest {
            title_path: vec!["contact".into(), title.into()],
            title: title.into(),
            file: Some("tests/contact.spec.js".into()),
            line: Some(12),
            status,
            duration_ms: 150,
            ..Default::default()
        }
    }

    #[test]
    fn test_error_message_reduction() {
        assert_eq!(error_message(&json!({"message": "boom", "stack": "..."})).as_deref(), Some("boom"));
        assert_eq!(error_message(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(error_message(&json!({"value": "thrown"})).as_deref(), Some("thrown"));
        assert_eq!(error_message(&json!(42)).as_deref(), Some("42"));
        assert_eq!(error_message(&Value::Null), None);
    }

    #[test]
    fn test_record_defaults() {
        let mut session = RunSession::begin();
        let record = session.record(CompletedTest {
            title: "lonely".into(),
            errors: vec![json!({"message": "expected visible"})],
            ..Default::default()
        });
        assert_eq!(record.title_path, vec!["lonely".to_string()]);
        assert_eq!(record.errors, vec!["expected visible".to_string()]);
        assert!(record.stdout.is_empty());
        assert_eq!(record.status, TestStatus::Unknown);
    }

    #[test]
    fn test_finish_counts() {
        let start = Utc::now();
        let mut session = RunSession::begin_at(start);
        session.record(completed("a", TestStatus::Passed));
        session.record(completed("b", TestStatus::Failed));
        session.record(completed("c", TestStatus::TimedOut));
        session.record(completed("d", TestStatus::Interrupted));

        let run = session.finish_at(start + chrono::Duration::milliseconds(1500));
        assert_eq!(run.total, 4);
        assert_eq!(run.counts.sum(), run.total);
        assert_eq!(run.counts.unknown, 1);
        assert_eq!(run.duration_ms, 1500);
    }

    #[test]
    fn test_fallback_counts_only_without_tests() {
        let fallback = OutcomeCounts { passed: 3, failed: 1, ..Default::default() };

        let mut empty = RunSession::begin();
        empty.set_fallback_counts(fallback);
        let run = empty.finish();
        assert_eq!(run.total, 4);
        assert!(run.tests.is_empty());

        let mut recorded = RunSession::begin();
        recorded.set_fallback_counts(fallback);
        recorded.record(completed("a", TestStatus::Passed));
        let run = recorded.finish();
        assert_eq!(run.total, 1);
        assert_eq!(run.counts.passed, 1);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
        assert_eq!(tail("ééé", 2), "éé");
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("test-results/aggregate-results.json")),
            PathBuf::from("test-results/aggregate-results.json.lock")
        );
    }

    #[test]
    fn test_append_replaces_log_whole() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("aggregate-results.json"));
        std::fs::write(sidecar_path(log.path(), ".tmp"), "leftover from a crash").unwrap();

        let mut session = RunSession::begin();
        session.record(completed("a", TestStatus::Passed));
        assert_eq!(log.append(&session.finish()).unwrap(), 1);
        assert_eq!(log.append(&RunSession::begin().finish()).unwrap(), 2);

        assert!(!sidecar_path(log.path(), ".tmp").exists());
        assert_eq!(log.read_entries().len(), 2);
    }

    #[test]
    fn test_run_record_wire_shape() {
        let mut session = RunSession::begin();
        session.record(completed("a", TestStatus::Passed));
        let value = serde_json::to_value(session.finish()).unwrap();

        for key in ["runAt", "endAt", "durationMs", "total", "counts", "tests"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value.get("exitCode").is_none());
        assert_eq!(value["counts"]["timedOut"], 0);
        assert_eq!(value["tests"][0]["titlePath"], json!(["contact", "a"]));
    }
}
