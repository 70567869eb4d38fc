//! CLI Commands

pub mod analyze;
pub mod collect;
pub mod record;
pub mod run;
pub mod summary;

use sitecheck_triage::{PlaywrightReport, RunSession};

use crate::output::{print_test_line, OutputFormat};

/// Feed every test of `report` into `session`, echoing one line per test
pub fn ingest(session: &mut RunSession, report: &PlaywrightReport, format: OutputFormat) {
    for test in report.completed_tests() {
        let record = session.record(test);
        if format == OutputFormat::Table {
            print_test_line(record);
        }
    }
}
