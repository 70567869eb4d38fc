//! Core types for sitecheck
//!
//! Everything here is a wire format: the persistent run log, incident files,
//! analysis files and the CI summary payload are all serialized from these
//! structs, so field names follow the camelCase keys the files have always used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Run log
// ============================================================================

/// Outcome of a single executed test, as reported by the test runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
    Interrupted,
    #[serde(other)]
    Unknown,
}

impl Default for TestStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl TestStatus {
    /// Parse a runner status string. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            "timedOut" => Self::TimedOut,
            "interrupted" => Self::Interrupted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::TimedOut => "timedOut",
            Self::Interrupted => "interrupted",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed test case within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    /// Suite titles from the outermost suite down to the case itself
    #[serde(default)]
    pub title_path: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub status: TestStatus,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub stdout: Vec<String>,
    #[serde(default)]
    pub stderr: Vec<String>,
}

/// Per-outcome counters of a run. The buckets always sum to the run total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// Interrupted and unrecognised outcomes
    pub unknown: usize,
}

impl OutcomeCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a TestStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.add(*status);
        }
        counts
    }

    pub fn add(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::TimedOut => self.timed_out += 1,
            TestStatus::Interrupted | TestStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn sum(&self) -> usize {
        self.passed + self.failed + self.skipped + self.timed_out + self.unknown
    }
}

/// One persisted test-execution session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub counts: OutcomeCounts,
    #[serde(default)]
    pub tests: Vec<TestRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_snippet: Option<String>,
}

// ============================================================================
// Incidents
// ============================================================================

/// Where an incident came from and what it was correlated against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentMetadata {
    #[serde(rename = "baseURL", default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub artifacts_dir: String,
    /// Report file the failure was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_json: Option<String>,
    /// Set instead of `source_json` for directory-synthesized incidents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_from: Option<String>,
}

/// A failed test together with the artifacts correlated to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screenshots: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub videos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub traces: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hars: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub html: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<String>,
    /// Captured requests (`{url, status}`), only present when a producer adds them
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub network: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: IncidentMetadata,
}

// ============================================================================
// Incident analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkIssueKind {
    ClientError,
    ServerError,
}

impl NetworkIssueKind {
    /// 4xx is a client error, 5xx a server error, anything else is not an issue.
    pub fn from_status(status: u64) -> Option<Self> {
        match status {
            400..=499 => Some(Self::ClientError),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIssue {
    pub url: Option<String>,
    pub status: u64,
    #[serde(rename = "type")]
    pub kind: NetworkIssueKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCounts {
    pub screenshots: usize,
    pub videos: usize,
    pub traces: usize,
    pub hars: usize,
    pub html: usize,
    pub logs: usize,
}

impl From<&Incident> for ArtifactCounts {
    fn from(incident: &Incident) -> Self {
        Self {
            screenshots: incident.screenshots.len(),
            videos: incident.videos.len(),
            traces: incident.traces.len(),
            hars: incident.hars.len(),
            html: incident.html.len(),
            logs: incident.logs.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub test_id: Option<String>,
    pub title: Option<String>,
    pub file: Option<String>,
    pub heuristics: Vec<String>,
    pub network_issues: Vec<NetworkIssue>,
    pub artifacts: ArtifactCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseEstimate {
    pub cause: String,
    pub confidence: Confidence,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicAnswer {
    pub heuristic_only: bool,
    pub causes: Vec<CauseEstimate>,
}

/// Diagnosis attached to an analysis: exactly one of the three shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmOutcome {
    /// No credential was available; causes were synthesized from heuristics
    HeuristicOnly(HeuristicAnswer),
    /// The completion service could not be reached or answered garbage
    Failed { error: String },
    /// Raw completion service response, stored verbatim
    Response(serde_json::Value),
}

impl LlmOutcome {
    pub fn is_heuristic_only(&self) -> bool {
        matches!(self, Self::HeuristicOnly(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAnalysis {
    pub incident_file: String,
    pub summary: AnalysisSummary,
    pub prompt: String,
    pub llm: LlmOutcome,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CI summary
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiCounts {
    pub passed: usize,
    pub failed: usize,
    pub flaky: usize,
    pub interrupted: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub total: usize,
}

impl CiCounts {
    pub fn executed(&self) -> usize {
        self.total.saturating_sub(self.skipped)
    }

    /// `(passed + flaky) / executed` as a percentage with two decimals,
    /// halves rounded up. Zero executed tests yields `"0.00"`.
    pub fn success_rate(&self) -> String {
        let executed = self.executed();
        if executed == 0 {
            return "0.00".to_string();
        }
        // Hundredths of a percent, ties rounded up
        let successful = (self.passed + self.flaky) as u64;
        let executed = executed as u64;
        let hundredths = (successful * 20_000 + executed) / (2 * executed);
        format!("{}.{:02}", hundredths / 100, hundredths % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiSummary {
    pub software_version: String,
    pub run_at: DateTime<Utc>,
    pub source_file: String,
    pub counts: CiCounts,
    pub success_rate: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&TestStatus::TimedOut).unwrap(), "\"timedOut\"");
        let parsed: TestStatus = serde_json::from_str("\"somethingElse\"").unwrap();
        assert_eq!(parsed, TestStatus::Unknown);
        assert_eq!(TestStatus::parse("interrupted"), TestStatus::Interrupted);
    }

    #[test]
    fn test_counts_sum_to_total() {
        let statuses = [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Interrupted,
            TestStatus::TimedOut,
            TestStatus::Skipped,
            TestStatus::Unknown,
        ];
        let counts = OutcomeCounts::tally(statuses.iter());
        assert_eq!(counts.sum(), statuses.len());
        assert_eq!(counts.unknown, 2);
    }

    #[test]
    fn test_success_rate() {
        let counts = CiCounts { passed: 8, flaky: 1, skipped: 1, total: 10, ..Default::default() };
        assert_eq!(counts.executed(), 9);
        assert_eq!(counts.success_rate(), "100.00");

        let empty = CiCounts { skipped: 3, total: 3, ..Default::default() };
        assert_eq!(empty.success_rate(), "0.00");

        let partial = CiCounts { passed: 2, failed: 1, total: 3, ..Default::default() };
        assert_eq!(partial.success_rate(), "66.67");
    }

    #[test_case(1, 31, "3.13" ; "one in thirty two rounds the tie up")]
    #[test_case(5, 27, "15.63" ; "five in thirty two rounds the tie up")]
    #[test_case(1, 7, "14.29" ; "plain rounding up")]
    #[test_case(1, 6, "16.67" ; "repeating decimal")]
    #[test_case(1, 0, "100.00" ; "all passed")]
    fn test_success_rate_rounding(passed: usize, failed: usize, expected: &str) {
        let counts = CiCounts { passed, failed, total: passed + failed, ..Default::default() };
        assert_eq!(counts.success_rate(), expected);
    }

    #[test]
    fn test_incident_nulls_read_as_empty() {
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "testId": "contact.spec.js:submits",
            "title": null,
            "error": null,
            "screenshots": null,
            "videos": null,
            "traces": null,
            "hars": null,
            "html": null,
            "logs": ["a/console.log"],
            "network": null,
            "metadata": {"artifactsDir": "artifacts"}
        }))
        .unwrap();

        assert_eq!(incident.error, "");
        assert!(incident.screenshots.is_empty());
        assert!(incident.network.is_empty());
        assert_eq!(incident.logs, vec!["a/console.log".to_string()]);
        assert_eq!(incident.title, None);
    }

    #[test]
    fn test_network_issue_kind() {
        assert_eq!(NetworkIssueKind::from_status(404), Some(NetworkIssueKind::ClientError));
        assert_eq!(NetworkIssueKind::from_status(503), Some(NetworkIssueKind::ServerError));
        assert_eq!(NetworkIssueKind::from_status(302), None);
        assert_eq!(NetworkIssueKind::from_status(600), None);
    }

    #[test]
    fn test_llm_outcome_shapes() {
        let failed = LlmOutcome::Failed { error: "connection refused".into() };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "error": "connection refused" })
        );

        let heuristic = LlmOutcome::HeuristicOnly(HeuristicAnswer {
            heuristic_only: true,
            causes: vec![],
        });
        let value = serde_json::to_value(&heuristic).unwrap();
        assert_eq!(value["heuristic_only"], true);

        let back: LlmOutcome = serde_json::from_value(value).unwrap();
        assert!(back.is_heuristic_only());
    }

    #[test]
    fn test_incident_metadata_keys() {
        let meta = IncidentMetadata {
            base_url: Some("http://localhost:3001/".into()),
            artifacts_dir: "/tmp/artifacts".into(),
            source_json: None,
            generated_from: Some("fallback-scan".into()),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["baseURL"], "http://localhost:3001/");
        assert_eq!(value["generatedFrom"], "fallback-scan");
        assert!(value.get("sourceJson").is_none());
    }
}
