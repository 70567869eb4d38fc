//! Artifact discovery and classification

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{TriageError, TriageResult};

/// Kind of artifact a file is recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    Video,
    Trace,
    NetworkCapture,
    PageSnapshot,
    Log,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Screenshot,
        ArtifactKind::Video,
        ArtifactKind::Trace,
        ArtifactKind::NetworkCapture,
        ArtifactKind::PageSnapshot,
        ArtifactKind::Log,
    ];

    /// Whether a file name (not the full path) falls into this category
    pub fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        match self {
            ArtifactKind::Screenshot => name.ends_with(".png"),
            ArtifactKind::Video => [".webm", ".mp4", ".mov"].iter().any(|ext| name.ends_with(ext)),
            // "trace*.zip" is subsumed by the broader ".zip" rule
            ArtifactKind::Trace => name.ends_with(".zip"),
            ArtifactKind::NetworkCapture => name.ends_with(".har"),
            ArtifactKind::PageSnapshot => name.ends_with(".html"),
            ArtifactKind::Log => ["log", "console", "stdout", "stderr"]
                .iter()
                .any(|needle| name.contains(needle)),
        }
    }

    /// Every category `path` belongs to; categories overlap
    pub fn classify(path: &Path) -> Vec<ArtifactKind> {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => return Vec::new(),
        };
        Self::ALL.into_iter().filter(|k| k.matches(&name)).collect()
    }
}

/// Classification of every file under an artifacts root
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactIndex {
    pub root: PathBuf,
    pub screenshots: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
    pub traces: Vec<PathBuf>,
    pub hars: Vec<PathBuf>,
    pub html: Vec<PathBuf>,
    pub logs: Vec<PathBuf>,
}

impl ArtifactIndex {
    /// Build an index from an explicit file list
    pub fn from_files(root: impl Into<PathBuf>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut index = Self {
            root: root.into(),
            ..Default::default()
        };
        for file in files {
            for kind in ArtifactKind::classify(&file) {
                index.bucket_mut(kind).push(file.clone());
            }
        }
        index
    }

    pub fn get(&self, kind: ArtifactKind) -> &[PathBuf] {
        match kind {
            ArtifactKind::Screenshot => &self.screenshots,
            ArtifactKind::Video => &self.videos,
            ArtifactKind::Trace => &self.traces,
            ArtifactKind::NetworkCapture => &self.hars,
            ArtifactKind::PageSnapshot => &self.html,
            ArtifactKind::Log => &self.logs,
        }
    }

    fn bucket_mut(&mut self, kind: ArtifactKind) -> &mut Vec<PathBuf> {
        match kind {
            ArtifactKind::Screenshot => &mut self.screenshots,
            ArtifactKind::Video => &mut self.videos,
            ArtifactKind::Trace => &mut self.traces,
            ArtifactKind::NetworkCapture => &mut self.hars,
            ArtifactKind::PageSnapshot => &mut self.html,
            ArtifactKind::Log => &mut self.logs,
        }
    }

    /// Paths in `kind` whose full path contains `key`, case-insensitively
    pub fn matching(&self, kind: ArtifactKind, key: &str) -> Vec<PathBuf> {
        let key = key.to_lowercase();
        self.get(kind)
            .iter()
            .filter(|p| p.to_string_lossy().to_lowercase().contains(&key))
            .cloned()
            .collect()
    }

    /// Distinct files across all categories
    pub fn all_files(&self) -> BTreeSet<&PathBuf> {
        ArtifactKind::ALL
            .iter()
            .flat_map(|k| self.get(*k).iter())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        ArtifactKind::ALL.iter().all(|k| self.get(*k).is_empty())
    }
}

/// Recursively list every file under `root`; directories are traversed, not returned
pub fn walk_files(root: &Path) -> TriageResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(TriageError::DirectoryNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Classify every file under `root`
pub fn scan(root: &Path) -> TriageResult<ArtifactIndex> {
    let files = walk_files(root)?;
    let index = ArtifactIndex::from_files(root, files);
    debug!(
        "Scanned {}: {} screenshots, {} videos, {} traces, {} hars, {} html, {} logs",
        root.display(),
        index.screenshots.len(),
        index.videos.len(),
        index.traces.len(),
        index.hars.len(),
        index.html.len(),
        index.logs.len()
    );
    Ok(index)
}

/// Every `.json` file under `root`
pub fn find_json_files(root: &Path) -> TriageResult<Vec<PathBuf>> {
    Ok(walk_files(root)?
        .into_iter()
        .filter(|p| p.to_string_lossy().to_lowercase().ends_with(".json"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("test-failed-1.png", &[ArtifactKind::Screenshot] ; "screenshot")]
    #[test_case("video.WEBM", &[ArtifactKind::Video] ; "video upper case")]
    #[test_case("clip.mov", &[ArtifactKind::Video] ; "quicktime")]
    #[test_case("trace.zip", &[ArtifactKind::Trace] ; "trace")]
    #[test_case("bundle.zip", &[ArtifactKind::Trace] ; "any zip")]
    #[test_case("network.har", &[ArtifactKind::NetworkCapture] ; "har")]
    #[test_case("page.html", &[ArtifactKind::PageSnapshot] ; "html")]
    #[test_case("browser-console.txt", &[ArtifactKind::Log] ; "console")]
    #[test_case("run.log", &[ArtifactKind::Log] ; "log extension")]
    #[test_case("console-trace.zip", &[ArtifactKind::Trace, ArtifactKind::Log] ; "overlapping")]
    #[test_case("stdout-error-context.html", &[ArtifactKind::PageSnapshot, ArtifactKind::Log] ; "html and log")]
    #[test_case("results.json", &[] ; "unclassified")]
    fn test_classify(name: &str, expected: &[ArtifactKind]) {
        assert_eq!(ArtifactKind::classify(Path::new(name)), expected);
    }

    #[test]
    fn test_classify_uses_file_name_only() {
        let kinds = ArtifactKind::classify(Path::new("logs/run-1/shot.png"));
        assert_eq!(kinds, vec![ArtifactKind::Screenshot]);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(scan(&missing), Err(TriageError::DirectoryNotFound(p)) if p == missing));
    }

    #[test]
    fn test_scan_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("contact-form-chromium");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("test-failed-1.png"), b"png").unwrap();
        std::fs::write(nested.join("trace.zip"), b"zip").unwrap();
        std::fs::write(nested.join("console.log"), b"log").unwrap();
        std::fs::write(dir.path().join("playwright-results.json"), b"{}").unwrap();

        let index = scan(dir.path()).unwrap();
        assert_eq!(index.screenshots, vec![nested.join("test-failed-1.png")]);
        assert_eq!(index.traces, vec![nested.join("trace.zip")]);
        assert_eq!(index.logs, vec![nested.join("console.log")]);
        assert_eq!(index.all_files().len(), 3);

        let json = find_json_files(dir.path()).unwrap();
        assert_eq!(json, vec![dir.path().join("playwright-results.json")]);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let index = ArtifactIndex::from_files(
            "artifacts",
            vec![
                PathBuf::from("artifacts/Contact-Form-chromium/test-failed-1.png"),
                PathBuf::from("artifacts/home-chromium/test-failed-1.png"),
            ],
        );
        let hits = index.matching(ArtifactKind::Screenshot, "contact");
        assert_eq!(hits, vec![PathBuf::from("artifacts/Contact-Form-chromium/test-failed-1.png")]);
    }
}
