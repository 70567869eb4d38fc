//! Sitecheck test-run triage
//!
//! This crate turns the output of a Playwright test run into durable,
//! analysable records:
//! - Records every finished test into an append-only run log
//! - Scans the artifacts directory and packages failures as incident files
//! - Diagnoses incidents heuristically, optionally asking a completion service
//! - Condenses a Playwright JSON report into a CI summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Sitecheck triage (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightRunner ──► PlaywrightReport ──► RunSession       │
//! │                                              └─► RunLog     │
//! │  scanner::scan ──► ArtifactIndex ─┐                         │
//! │  PlaywrightReport(s) ─────────────┴─► IncidentBuilder       │
//! │                                         └─► incident-*.json │
//! │  IncidentAnalyzer ──► *.analysis.json                       │
//! │     └── CompletionClient (optional)                         │
//! │  summary::summarize ──► ci-test-summary.{json,md}           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod analyzer;
pub mod error;
pub mod incident;
pub mod llm;
pub mod playwright;
pub mod recorder;
pub mod report;
pub mod scanner;
pub mod summary;

pub use analyzer::{AnalysisTarget, AnalyzeOutcome, IncidentAnalyzer};
pub use error::{TriageError, TriageResult};
pub use incident::{CollectMode, CollectOutcome, IncidentBuilder};
pub use playwright::{ListSummary, PlaywrightConfig, PlaywrightRunner, RunOutput};
pub use recorder::{CompletedTest, RunLog, RunSession};
pub use report::PlaywrightReport;
pub use scanner::{ArtifactIndex, ArtifactKind};
