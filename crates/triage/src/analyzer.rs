//! Incident analysis
//!
//! Each incident gets a fixed battery of heuristics, a diagnostic prompt and
//! either the completion service's verbatim answer or, without a credential,
//! causes synthesized from the heuristics. The result is written next to the
//! incident as `<name>.analysis.json`.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use sitecheck_common::{
    AnalysisSummary, ArtifactCounts, CauseEstimate, Confidence, HeuristicAnswer, Incident,
    IncidentAnalysis, LlmConfig, LlmOutcome, NetworkIssue, NetworkIssueKind,
};

use crate::error::{TriageError, TriageResult};
use crate::llm::{ChatCompletionClient, CompletionClient};

const ANALYSIS_SUFFIX: &str = ".analysis.json";
const MAX_PROMPT_NETWORK_ISSUES: usize = 5;
const MAX_HEURISTIC_CAUSES: usize = 3;

static TIMEOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"timeout|timed out|exceeded").expect("valid regex"));
static SCRIPT_ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"cannot read propert|typeerror|referenceerror|is not a function").expect("valid regex")
});
static CONNECTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"econnrefused|econnreset|enotfound|refused|socket|net::err_").expect("valid regex")
});
static INCIDENT_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)incident.*\.json$").expect("valid regex"));

pub const TIMEOUT_FINDING: &str = "Timeout probable (locator, network or slow load).";
pub const SCRIPT_ERROR_FINDING: &str = "Script error (null/undefined access or uncaught exception).";
pub const NETWORK_ERROR_FINDING: &str = "Network / infra error (connection refused, reset or DNS).";
pub const HAR_FINDING: &str = "Network HAR present: check HTTP status codes and failed requests.";
pub const SCREENSHOT_FINDING: &str = "Screenshot(s) available: a visual diff may help.";
pub const TRACE_FINDING: &str = "Trace(s) available: open them in the Playwright trace viewer.";

const QUESTION: &str = "Question: Give 3 probable causes, a confidence estimate for each \
(low/medium/high), and 2 concrete actions to investigate or fix.";

// ============================================================================
// Heuristics and prompt
// ============================================================================

/// Run the heuristic battery, in its fixed order
pub fn heuristics(incident: &Incident) -> (Vec<String>, Vec<NetworkIssue>) {
    let mut findings = Vec::new();
    let error = incident.error.to_lowercase();

    if TIMEOUT_PATTERN.is_match(&error) {
        findings.push(TIMEOUT_FINDING.to_string());
    }
    if SCRIPT_ERROR_PATTERN.is_match(&error) {
        findings.push(SCRIPT_ERROR_FINDING.to_string());
    }
    if CONNECTION_PATTERN.is_match(&error) {
        findings.push(NETWORK_ERROR_FINDING.to_string());
    }
    if !incident.hars.is_empty() {
        findings.push(HAR_FINDING.to_string());
    }
    if !incident.screenshots.is_empty() {
        findings.push(SCREENSHOT_FINDING.to_string());
    }
    if !incident.traces.is_empty() {
        findings.push(TRACE_FINDING.to_string());
    }

    let issues = network_issues(incident);
    if !issues.is_empty() {
        findings.push(format!("Detected {} network errors (4xx/5xx).", issues.len()));
    }

    (findings, issues)
}

/// 4xx/5xx entries of the incident's captured requests
pub fn network_issues(incident: &Incident) -> Vec<NetworkIssue> {
    incident
        .network
        .iter()
        .filter_map(|entry| {
            let status = entry.get("status").and_then(|s| s.as_u64())?;
            let kind = NetworkIssueKind::from_status(status)?;
            Some(NetworkIssue {
                url: entry.get("url").and_then(|u| u.as_str()).map(String::from),
                status,
                kind,
            })
        })
        .collect()
}

pub fn summarize(incident: &Incident) -> AnalysisSummary {
    let (heuristics, network_issues) = heuristics(incident);
    AnalysisSummary {
        test_id: incident.test_id.clone(),
        title: incident.title.clone(),
        file: incident.file.clone(),
        heuristics,
        network_issues,
        artifacts: ArtifactCounts::from(incident),
    }
}

/// Natural-language diagnostic request for one incident
pub fn build_prompt(summary: &AnalysisSummary, error: &str) -> String {
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
    let mut lines = vec![format!(
        "Context: test \"{}\" ({}) in {}.",
        or_unknown(&summary.title),
        or_unknown(&summary.test_id),
        or_unknown(&summary.file)
    )];

    if !error.is_empty() {
        lines.push(format!("Error: {}", error));
    }

    if !summary.network_issues.is_empty() {
        let issues: Vec<String> = summary
            .network_issues
            .iter()
            .take(MAX_PROMPT_NETWORK_ISSUES)
            .map(|n| format!("{} {}", n.status, n.url.as_deref().unwrap_or("?")))
            .collect();
        lines.push(format!("Network issues: {}", issues.join("; ")));
    }

    let a = &summary.artifacts;
    lines.push(format!(
        "Artifacts: {} screenshot(s), {} video(s), {} trace(s), {} HAR(s), {} HTML snapshot(s), {} log(s).",
        a.screenshots, a.videos, a.traces, a.hars, a.html, a.logs
    ));

    let findings = if summary.heuristics.is_empty() {
        "none".to_string()
    } else {
        summary.heuristics.join(" | ")
    };
    lines.push(format!("Heuristics detected: {}", findings));
    lines.push(QUESTION.to_string());

    lines.join("\n")
}

/// Causes synthesized without the completion service
pub fn heuristic_answer(findings: &[String]) -> HeuristicAnswer {
    let causes = if findings.is_empty() {
        vec![CauseEstimate {
            cause: "Unknown".to_string(),
            confidence: Confidence::Low,
            actions: vec!["Inspect logs and artifacts manually".to_string()],
        }]
    } else {
        findings
            .iter()
            .take(MAX_HEURISTIC_CAUSES)
            .enumerate()
            .map(|(i, finding)| CauseEstimate {
                cause: finding.clone(),
                confidence: if i == 0 { Confidence::High } else { Confidence::Medium },
                actions: vec![
                    "Open related screenshot/trace".to_string(),
                    "Check corresponding network request/status".to_string(),
                ],
            })
            .collect()
    };

    HeuristicAnswer {
        heuristic_only: true,
        causes,
    }
}

/// `incident-1.json` -> `incident-1.analysis.json`, in the same directory
pub fn analysis_path(incident_file: &Path) -> PathBuf {
    let name = incident_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if name.to_lowercase().ends_with(".json") {
        &name[..name.len() - ".json".len()]
    } else {
        name.as_str()
    };
    incident_file.with_file_name(format!("{}{}", stem, ANALYSIS_SUFFIX))
}

/// Incident files in `dir`, excluding previous analyses, sorted by name
pub fn find_incident_files(dir: &Path) -> TriageResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if INCIDENT_FILE.is_match(&name) && !name.ends_with(ANALYSIS_SUFFIX) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

// ============================================================================
// Analyzer
// ============================================================================

/// What to analyze
#[derive(Debug, Clone)]
pub enum AnalysisTarget {
    /// A single explicitly named incident file
    File(PathBuf),
    /// Every incident file in a directory
    Directory(PathBuf),
}

#[derive(Debug, Default)]
pub struct AnalyzeOutcome {
    /// Analysis files written
    pub written: Vec<PathBuf>,
    /// Incidents that could not be analyzed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

pub struct IncidentAnalyzer {
    client: Option<Box<dyn CompletionClient>>,
}

impl IncidentAnalyzer {
    /// Analyzer that never calls out
    pub fn heuristic_only() -> Self {
        Self { client: None }
    }

    pub fn with_client(client: impl CompletionClient + 'static) -> Self {
        Self {
            client: Some(Box::new(client)),
        }
    }

    /// Use the completion service when a credential is present in the environment
    pub fn from_env(config: &LlmConfig) -> TriageResult<Self> {
        match sitecheck_common::api_key_from_env() {
            Some(key) => {
                info!("API key detected: incidents will be sent to {} (this may cost tokens)", config.endpoint);
                Ok(Self::with_client(ChatCompletionClient::new(config, key)?))
            }
            None => Ok(Self::heuristic_only()),
        }
    }

    pub fn uses_completion_service(&self) -> bool {
        self.client.is_some()
    }

    /// Build the analysis record for one incident
    pub async fn analyze_incident(&self, incident: &Incident, incident_file: &Path) -> IncidentAnalysis {
        let summary = summarize(incident);
        let prompt = build_prompt(&summary, &incident.error);

        let llm = match &self.client {
            Some(client) => match client.complete(&prompt).await {
                Ok(response) => LlmOutcome::Response(response),
                Err(e) => {
                    warn!("Completion request for {} failed: {}", incident_file.display(), e);
                    LlmOutcome::Failed { error: e.to_string() }
                }
            },
            None => LlmOutcome::HeuristicOnly(heuristic_answer(&summary.heuristics)),
        };

        IncidentAnalysis {
            incident_file: incident_file.display().to_string(),
            summary,
            prompt,
            llm,
            created_at: chrono::Utc::now(),
        }
    }

    /// Analyze one incident file and write its analysis next to it
    pub async fn analyze_file(&self, incident_file: &Path) -> TriageResult<PathBuf> {
        if !incident_file.is_file() {
            return Err(TriageError::IncidentNotFound(incident_file.to_path_buf()));
        }

        let content = std::fs::read_to_string(incident_file)?;
        let incident: Incident = serde_json::from_str(&content).map_err(|source| TriageError::InvalidIncident {
            path: incident_file.to_path_buf(),
            source,
        })?;

        let analysis = self.analyze_incident(&incident, incident_file).await;
        let out = analysis_path(incident_file);
        std::fs::write(&out, serde_json::to_string_pretty(&analysis)?)?;

        info!("Analysis written to {}", out.display());
        Ok(out)
    }

    /// Analyze a file or every incident of a directory.
    ///
    /// A missing file or directory is an error. In directory mode each
    /// incident stands alone: one that fails is reported and the rest proceed.
    pub async fn analyze(&self, target: &AnalysisTarget) -> TriageResult<AnalyzeOutcome> {
        let mut outcome = AnalyzeOutcome::default();

        match target {
            AnalysisTarget::File(path) => {
                outcome.written.push(self.analyze_file(path).await?);
            }
            AnalysisTarget::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(TriageError::DirectoryNotFound(dir.clone()));
                }

                let files = find_incident_files(dir)?;
                if files.is_empty() {
                    info!("No incident JSON files found in {}", dir.display());
                }

                for file in files {
                    match self.analyze_file(&file).await {
                        Ok(out) => outcome.written.push(out),
                        Err(e) => {
                            warn!("Skipping {}: {}", file.display(), e);
                            outcome.failed.push((file, e.to_string()));
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }
}
