//! Software version lookup from a `VERSION` file

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SOFTWARE\s*VERSION\s*:\s*(.+)").expect("valid regex"));

pub const UNKNOWN_VERSION: &str = "unknown";

/// Read the software version from `path`.
///
/// The first non-empty line is matched against `SOFTWARE VERSION: <value>`;
/// without a match the raw line is used. A missing or unreadable file, or one
/// without any content, yields `"unknown"`.
pub fn extract_version(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_version(&content),
        Err(e) => {
            tracing::debug!("No version file at {}: {}", path.display(), e);
            UNKNOWN_VERSION.to_string()
        }
    }
}

pub fn parse_version(content: &str) -> String {
    let line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default();

    let value = VERSION_LINE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(line)
        .trim();

    if value.is_empty() {
        UNKNOWN_VERSION.to_string()
    } else {
        value.to_string()
    }
}
