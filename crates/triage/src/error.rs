//! Error types for the triage pipeline

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Incident not found: {}", .0.display())]
    IncidentNotFound(PathBuf),

    #[error("Playwright JSON report not found at: {}", .0.display())]
    ReportNotFound(PathBuf),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Invalid incident {}: {source}", path.display())]
    InvalidIncident {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] sitecheck_common::Error),
}

impl TriageError {
    /// A required input file or directory is missing
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            TriageError::DirectoryNotFound(_) | TriageError::IncidentNotFound(_) | TriageError::ReportNotFound(_)
        )
    }
}

pub type TriageResult<T> = Result<T, TriageError>;
