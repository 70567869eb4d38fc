//! Incident packaging
//!
//! Failed tests are pulled out of whatever JSON reports can be found, each
//! one is correlated with the artifacts whose path mentions the failing
//! spec file, and the result is written as one `incident-*.json` per failure.
//! When no report lists a failure, incidents are synthesized per artifact
//! directory instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use sitecheck_common::{Incident, IncidentMetadata, SitecheckConfig};

use crate::error::TriageResult;
use crate::scanner::{self, ArtifactIndex, ArtifactKind};

/// Marker stored in `metadata.generatedFrom` for directory-synthesized incidents
pub const FALLBACK_ORIGIN: &str = "fallback-scan";

const UNKNOWN_TITLE: &str = "unknown test";
const UNKNOWN_FILE: &str = "unknown file";

static INCIDENT_SEQ: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Failure extraction
// ============================================================================

/// An object found somewhere in a report with `status` `failed` or `error`
#[derive(Debug, Clone, PartialEq)]
pub struct FailureCandidate {
    pub source: PathBuf,
    pub entry: Map<String, Value>,
    /// Nearest enclosing `title`
    pub parent_title: Option<String>,
    /// Nearest enclosing `file` or `location.file`
    pub parent_file: Option<String>,
}

impl FailureCandidate {
    pub fn title(&self) -> String {
        str_field(&self.entry, "title")
            .or_else(|| self.entry.get("test").and_then(|t| t.get("title")).and_then(Value::as_str))
            .map(String::from)
            .or_else(|| self.parent_title.clone())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    pub fn file(&self) -> String {
        own_file(&self.entry)
            .or_else(|| self.parent_file.clone())
            .unwrap_or_else(|| UNKNOWN_FILE.to_string())
    }

    /// Error text: strings verbatim, anything structured as compact JSON
    pub fn error_text(&self) -> String {
        ["error", "err", "errors"]
            .iter()
            .filter_map(|k| self.entry.get(*k))
            .find(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }

    /// Key used to find this failure's artifacts: the file's base name without extension
    pub fn correlation_key(&self) -> String {
        correlation_key(&self.file())
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn own_file(map: &Map<String, Value>) -> Option<String> {
    str_field(map, "file")
        .or_else(|| map.get("location").and_then(|l| l.get("file")).and_then(Value::as_str))
        .map(String::from)
}

pub fn correlation_key(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

#[derive(Clone, Default)]
struct Context {
    title: Option<String>,
    file: Option<String>,
}

/// Walk `value` and collect every failed object, at any depth
pub fn extract_failures(value: &Value, source: &Path) -> Vec<FailureCandidate> {
    let mut out = Vec::new();
    visit(value, &Context::default(), source, &mut out);
    out
}

fn visit(value: &Value, ctx: &Context, source: &Path, out: &mut Vec<FailureCandidate>) {
    match value {
        Value::Object(map) => {
            if matches!(str_field(map, "status"), Some("failed") | Some("error")) {
                out.push(FailureCandidate {
                    source: source.to_path_buf(),
                    entry: map.clone(),
                    parent_title: ctx.title.clone(),
                    parent_file: ctx.file.clone(),
                });
            }

            let inner = Context {
                title: str_field(map, "title").map(String::from).or_else(|| ctx.title.clone()),
                file: own_file(map).or_else(|| ctx.file.clone()),
            };
            for child in map.values() {
                visit(child, &inner, source, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit(item, ctx, source, out);
            }
        }
        _ => {}
    }
}

/// A JSON file that parsed
#[derive(Debug, Clone)]
pub struct LoadedReport {
    pub source: PathBuf,
    pub content: Value,
}

/// Parse each path, skipping anything unreadable or not JSON
pub fn load_reports(paths: &[PathBuf]) -> Vec<LoadedReport> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path)
                .map_err(|e| debug!("Skipping {}: {}", path.display(), e))
                .ok()?;
            let value = serde_json::from_str::<Value>(&content)
                .map_err(|e| debug!("Skipping {}: not JSON ({})", path.display(), e))
                .ok()?;
            Some(LoadedReport {
                source: path.clone(),
                content: value,
            })
        })
        .collect()
}

// ============================================================================
// Incident construction
// ============================================================================

/// How incidents were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectMode {
    /// One incident per failure found in the reports
    Failures,
    /// No failures listed; one incident per artifact directory
    Fallback,
    /// Neither failures nor artifacts
    Nothing,
}

#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub mode: CollectMode,
    pub incidents_dir: PathBuf,
    pub written: Vec<PathBuf>,
}

/// Correlates failures with artifacts and writes incident files
#[derive(Debug, Clone)]
pub struct IncidentBuilder {
    artifacts_dir: PathBuf,
    results_dir: PathBuf,
    report_path: PathBuf,
    run_log: PathBuf,
    incidents_dir: PathBuf,
    base_url: Option<String>,
}

impl IncidentBuilder {
    pub fn new(config: &SitecheckConfig) -> Self {
        Self {
            artifacts_dir: config.paths.artifacts_dir.clone(),
            results_dir: config.paths.results_dir.clone(),
            report_path: config.paths.report.clone(),
            run_log: config.paths.run_log.clone(),
            incidents_dir: config.paths.incidents_dir(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn incidents_dir(&self) -> &Path {
        &self.incidents_dir
    }

    /// Known report and run log paths plus every JSON file under the artifacts
    /// and results roots.
    ///
    /// Duplicates are dropped, as are previously written incident files.
    pub fn source_reports(&self) -> TriageResult<Vec<PathBuf>> {
        let mut candidates = vec![self.report_path.clone(), self.run_log.clone()];
        candidates.extend(scanner::find_json_files(&self.artifacts_dir)?);

        if self.results_dir.is_dir() {
            candidates.extend(scanner::find_json_files(&self.results_dir)?);
        } else {
            debug!("Results directory {} not present", self.results_dir.display());
        }

        let incidents_dir = canonical(&self.incidents_dir);
        let mut seen = BTreeSet::new();

        Ok(candidates
            .into_iter()
            .filter(|p| p.is_file())
            .filter(|p| {
                let c = canonical(p);
                !c.starts_with(&incidents_dir) && seen.insert(c)
            })
            .collect())
    }

    /// Build one incident per failure, or per artifact directory when there are none
    pub fn build(&self, reports: &[LoadedReport], index: &ArtifactIndex) -> (CollectMode, Vec<Incident>) {
        let failures: Vec<FailureCandidate> = reports
            .iter()
            .flat_map(|r| extract_failures(&r.content, &r.source))
            .collect();

        if !failures.is_empty() {
            info!("Found {} failure(s) across {} report(s)", failures.len(), reports.len());
            let incidents = failures.iter().map(|f| self.incident_for_failure(f, index)).collect();
            return (CollectMode::Failures, incidents);
        }

        let incidents = self.incidents_by_directory(index);
        if incidents.is_empty() {
            (CollectMode::Nothing, incidents)
        } else {
            info!("No failures in reports; synthesized {} incident(s) from artifact directories", incidents.len());
            (CollectMode::Fallback, incidents)
        }
    }

    fn metadata(&self) -> IncidentMetadata {
        IncidentMetadata {
            base_url: self.base_url.clone(),
            artifacts_dir: canonical(&self.artifacts_dir).display().to_string(),
            source_json: None,
            generated_from: None,
        }
    }

    fn incident_for_failure(&self, failure: &FailureCandidate, index: &ArtifactIndex) -> Incident {
        let title = failure.title();
        let file = failure.file();
        let key = failure.correlation_key();
        let related = |kind| to_strings(index.matching(kind, &key));

        Incident {
            test_id: Some(format!("{}:{}", file, title)),
            error: failure.error_text(),
            screenshots: related(ArtifactKind::Screenshot),
            videos: related(ArtifactKind::Video),
            traces: related(ArtifactKind::Trace),
            hars: related(ArtifactKind::NetworkCapture),
            html: related(ArtifactKind::PageSnapshot),
            logs: related(ArtifactKind::Log),
            network: Vec::new(),
            metadata: IncidentMetadata {
                source_json: Some(failure.source.display().to_string()),
                ..self.metadata()
            },
            title: Some(title),
            file: Some(file),
        }
    }

    fn incidents_by_directory(&self, index: &ArtifactIndex) -> Vec<Incident> {
        let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for file in index.all_files() {
            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            by_dir.entry(dir).or_default().push(file.clone());
        }

        by_dir
            .into_iter()
            .map(|(dir, files)| {
                let group = ArtifactIndex::from_files(&dir, files);
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| dir.display().to_string());

                Incident {
                    test_id: Some(format!("auto:{}", name)),
                    title: Some(format!("Artifacts from {}", name)),
                    file: Some(dir.display().to_string()),
                    error: String::new(),
                    screenshots: to_strings(group.screenshots),
                    videos: to_strings(group.videos),
                    traces: to_strings(group.traces),
                    hars: to_strings(group.hars),
                    html: to_strings(group.html),
                    logs: to_strings(group.logs),
                    network: Vec::new(),
                    metadata: IncidentMetadata {
                        generated_from: Some(FALLBACK_ORIGIN.to_string()),
                        ..self.metadata()
                    },
                }
            })
            .collect()
    }

    /// Write each incident to its own file
    pub fn write_all(&self, incidents: &[Incident]) -> TriageResult<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.incidents_dir)?;
        incidents
            .iter()
            .map(|incident| write_incident(&self.incidents_dir, incident))
            .collect()
    }

    /// Scan, extract, correlate and persist
    pub fn collect(&self) -> TriageResult<CollectOutcome> {
        let index = scanner::scan(&self.artifacts_dir)?;
        let sources = self.source_reports()?;
        debug!("Considering {} JSON source(s)", sources.len());

        let reports = load_reports(&sources);
        let (mode, incidents) = self.build(&reports, &index);

        if mode == CollectMode::Nothing {
            warn!("No failures or artifacts found to pack");
        }

        let written = self.write_all(&incidents)?;
        Ok(CollectOutcome {
            mode,
            incidents_dir: self.incidents_dir.clone(),
            written,
        })
    }
}

/// Persist one incident as `incident-<millis>-<seq>.json`, never overwriting
pub fn write_incident(dir: &Path, incident: &Incident) -> TriageResult<PathBuf> {
    let json = serde_json::to_string_pretty(incident)?;

    loop {
        let seq = INCIDENT_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = chrono::Utc::now().timestamp_millis();
        let path = dir.join(format!("incident-{}-{}.json", millis, seq));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                info!("Wrote {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn to_strings(paths: Vec<PathBuf>) -> Vec<String> {
    paths.into_iter().map(|p| p.display().to_string()).collect()
}
