//! Playwright test-runner process control

use std::path::PathBuf;
use std::process::{Command, Stdio};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use sitecheck_common::OutcomeCounts;

use crate::error::{TriageError, TriageResult};

/// Environment variable the JSON reporter reads its output path from
pub const JSON_OUTPUT_VAR: &str = "PLAYWRIGHT_JSON_OUTPUT_NAME";

/// Configuration for a Playwright run
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Launcher, normally `npx`
    pub launcher: String,
    /// Where the JSON reporter writes
    pub report_path: PathBuf,
    /// Project directory the run happens in
    pub working_dir: PathBuf,
    /// Extra arguments passed through to `playwright test`
    pub extra_args: Vec<String>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            launcher: "npx".to_string(),
            report_path: PathBuf::from("artifacts/playwright-results.json"),
            working_dir: PathBuf::from("."),
            extra_args: Vec::new(),
        }
    }
}

/// Captured output of a finished run
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub struct PlaywrightRunner {
    config: PlaywrightConfig,
}

impl PlaywrightRunner {
    pub fn new(config: PlaywrightConfig) -> TriageResult<Self> {
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Check that `<launcher> playwright --version` works
    fn check_playwright_installed(config: &PlaywrightConfig) -> TriageResult<()> {
        let status = Command::new(&config.launcher)
            .args(["playwright", "--version"])
            .current_dir(&config.working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(TriageError::Playwright(
                "Playwright not found. Install with: npm i -D @playwright/test".to_string(),
            )),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "playwright".to_string(),
            "test".to_string(),
            "--reporter=list,json".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Run the suite, echoing its output while capturing it
    pub async fn run(&self) -> TriageResult<RunOutput> {
        if let Some(parent) = self.config.report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.clear_report()?;

        let args = self.args();
        info!("Running {} {}", self.config.launcher, args.join(" "));

        let mut child = TokioCommand::new(&self.config.launcher)
            .args(&args)
            .current_dir(&self.config.working_dir)
            .env(JSON_OUTPUT_VAR, &self.config.report_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TriageError::Playwright(format!("Failed to spawn {}: {}", self.config.launcher, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TriageError::Playwright("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TriageError::Playwright("stderr not captured".to_string()))?;

        let stdout_task = tokio::spawn(tee(stdout, tokio::io::stdout()));
        let stderr_task = tokio::spawn(tee(stderr, tokio::io::stderr()));

        let status = child.wait().await?;
        let stdout = join_tee(stdout_task).await?;
        let stderr = join_tee(stderr_task).await?;

        let exit_code = status.code().unwrap_or(1);
        debug!("Playwright exited with {}", exit_code);

        Ok(RunOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Remove the previous run's report so a run that dies before the JSON
    /// reporter writes leaves no report behind
    fn clear_report(&self) -> TriageResult<()> {
        match std::fs::remove_file(&self.config.report_path) {
            Ok(()) => {
                debug!("Removed previous report {}", self.config.report_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Copy `reader` line by line into `writer`, returning everything read
async fn tee<R, W>(reader: R, mut writer: W) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();

    while let Some(line) = lines.next_line().await? {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        captured.push_str(&line);
        captured.push('\n');
    }
    writer.flush().await?;
    Ok(captured)
}

async fn join_tee(task: tokio::task::JoinHandle<std::io::Result<String>>) -> TriageResult<String> {
    task.await
        .map_err(|e| TriageError::Playwright(format!("output reader failed: {}", e)))?
        .map_err(TriageError::from)
}

static PASSED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) passed").expect("valid regex"));
static FAILED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) failed").expect("valid regex"));
static SKIPPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) skipped").expect("valid regex"));
static TIMED_OUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) timedOut").expect("valid regex"));
static RUNNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"Running\s+(\d+) tests?").expect("valid regex"));

/// Counts recovered from the list reporter's footer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// `Running N tests`, when printed
    pub announced: Option<usize>,
}

impl ListSummary {
    pub fn parse(stdout: &str) -> Self {
        let count = |re: &Regex| {
            re.captures(stdout)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        };

        Self {
            passed: count(&PASSED).unwrap_or(0),
            failed: count(&FAILED).unwrap_or(0),
            skipped: count(&SKIPPED).unwrap_or(0),
            timed_out: count(&TIMED_OUT).unwrap_or(0),
            announced: count(&RUNNING),
        }
    }

    /// Per-outcome counts; announced tests that never reported land in `unknown`
    pub fn counts(&self) -> OutcomeCounts {
        let reported = self.passed + self.failed + self.skipped + self.timed_out;
        OutcomeCounts {
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            timed_out: self.timed_out,
            unknown: self.announced.unwrap_or(reported).saturating_sub(reported),
        }
    }
}
