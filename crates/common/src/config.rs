//! Sitecheck configuration
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional
//! TOML file, environment variables, then whatever CLI flags the binary
//! applies on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variables accepted as the completion-service credential, in lookup order
pub const API_KEY_VARS: [&str; 3] = ["OPENAI_API_KEY", "OPENAI_KEY", "OPENAI_API"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitecheckConfig {
    /// File-system layout
    pub paths: PathsConfig,

    /// Base URL recorded in incident metadata
    pub base_url: Option<String>,

    /// Completion service settings
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the runner's artifacts (screenshots, videos, traces...)
    pub artifacts_dir: PathBuf,

    /// Secondary results directory scanned for JSON reports
    pub results_dir: PathBuf,

    /// Append-only run log
    pub run_log: PathBuf,

    /// Structured JSON report written by the runner
    pub report: PathBuf,

    /// File holding the software version line
    pub version_file: PathBuf,

    /// Where CI summaries are written
    pub out_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            results_dir: PathBuf::from("test-results"),
            run_log: PathBuf::from("test-results/aggregate-results.json"),
            report: PathBuf::from("artifacts/playwright-results.json"),
            version_file: PathBuf::from("VERSION"),
            out_dir: PathBuf::from("artifacts"),
        }
    }
}

impl PathsConfig {
    /// Directory incidents are written to and read from
    pub fn incidents_dir(&self) -> PathBuf {
        self.artifacts_dir.join("incidents")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions endpoint
    pub endpoint: String,

    pub model: String,

    pub temperature: f32,

    /// Upper bound on the response length
    pub max_tokens: u32,

    /// Request timeout for the whole exchange
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 60,
        }
    }
}

impl SitecheckConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from file and apply process environment overrides
    pub fn from_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SITECHECK_RUN_LOG") {
            self.paths.run_log = PathBuf::from(v);
        }
        if let Some(v) = get("PW_JSON_REPORT") {
            self.paths.report = PathBuf::from(v);
        }
        if let Some(v) = get("VERSION_FILE") {
            self.paths.version_file = PathBuf::from(v);
        }
        if let Some(v) = get("CI_REPORT_OUT_DIR") {
            self.paths.out_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.endpoint = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.llm.model = v;
        }
    }
}

/// First non-empty completion-service credential found in the environment
pub fn api_key_from_env() -> Option<String> {
    api_key_with(|key| std::env::var(key).ok())
}

pub fn api_key_with<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|v| !v.trim().is_empty())
}
