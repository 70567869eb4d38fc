//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use sitecheck_common::{CiSummary, RunRecord, TestRecord, TestStatus};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for RunRecord {
    fn headers() -> Vec<&'static str> {
        vec!["Passed", "Failed", "Skipped", "Timed out", "Unknown", "Total", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let c = &self.counts;
        vec![
            c.passed.to_string(),
            c.failed.to_string(),
            c.skipped.to_string(),
            c.timed_out.to_string(),
            c.unknown.to_string(),
            self.total.to_string(),
            format!("{}ms", self.duration_ms),
        ]
    }
}

impl TableDisplay for CiSummary {
    fn headers() -> Vec<&'static str> {
        vec!["Passed", "Failed", "Flaky", "Interrupted", "Timed out", "Skipped", "Total", "Success rate"]
    }

    fn row(&self) -> Vec<String> {
        let c = &self.counts;
        vec![
            c.passed.to_string(),
            c.failed.to_string(),
            c.flaky.to_string(),
            c.interrupted.to_string(),
            c.timed_out.to_string(),
            c.skipped.to_string(),
            c.total.to_string(),
            format!("{}%", self.success_rate),
        ]
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            table.add_row(item.row());

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
    }
}

/// One-line status of a finished test, plus its first error
pub fn print_test_line(test: &TestRecord) {
    println!("{}", test_line(test));
    if let Some(error) = test.errors.first() {
        println!("   {} {}", "Error:".red(), error);
    }
}

fn test_line(test: &TestRecord) -> String {
    let label = format!("[{}]", test.status.as_str().to_uppercase());
    let label = match test.status {
        TestStatus::Passed => label.green(),
        TestStatus::Failed => label.red(),
        TestStatus::Skipped => label.yellow(),
        TestStatus::TimedOut => label.magenta(),
        _ => label.normal(),
    };
    format!("{} {} {} ({}ms)", status_icon(test.status), label, test.title, test.duration)
}

pub fn status_icon(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "✅",
        TestStatus::Failed => "❌",
        TestStatus::Skipped => "⏭️",
        TestStatus::TimedOut => "⏱️",
        _ => "⚪",
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
