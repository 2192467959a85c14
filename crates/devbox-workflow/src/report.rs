//! Outcome records for a sequencer run.
//!
//! A `StepResult` is created once per step per run and never modified
//! afterwards; fields are private and exposed read-only. The `RunReport`
//! is assembled by the sequencer and handed to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const REPORT_VERSION: u32 = 1;

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Probe found the goal state already in place.
    Skipped,
    /// Apply ran and succeeded.
    Applied,
    /// Apply ran and raised an error.
    Failed,
    /// An upstream fatal failure prevented execution.
    Blocked,
}

impl StepStatus {
    pub fn label(self) -> &'static str {
        match self {
            StepStatus::Skipped => "skipped",
            StepStatus::Applied => "applied",
            StepStatus::Failed => "failed",
            StepStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    name: String,
    status: StepStatus,
    detail: String,
    timestamp_unix_ms: u64,
    duration_ms: u64,
    fatal: bool,
}

impl StepResult {
    pub(crate) fn new(
        name: &str,
        status: StepStatus,
        detail: impl Into<String>,
        duration_ms: u64,
        fatal: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
            timestamp_unix_ms: now_unix_ms(),
            duration_ms,
            fatal,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn timestamp_unix_ms(&self) -> u64 {
        self.timestamp_unix_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Effective fatality: the step's flag, or forced by an operator decline.
    pub fn fatal(&self) -> bool {
        self.fatal
    }

    /// A fatal step that failed; its dependents are blocked.
    pub fn is_fatal_failure(&self) -> bool {
        self.fatal && self.status == StepStatus::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    report_version: u32,
    dry_run: bool,
    started_at_unix_ms: u64,
    ended_at_unix_ms: u64,
    success: bool,
    results: Vec<StepResult>,
}

impl RunReport {
    pub(crate) fn new(dry_run: bool, started_at_unix_ms: u64, results: Vec<StepResult>) -> Self {
        let success = !results.iter().any(StepResult::is_fatal_failure);
        Self {
            report_version: REPORT_VERSION,
            dry_run,
            started_at_unix_ms,
            ended_at_unix_ms: now_unix_ms(),
            success,
            results,
        }
    }

    pub fn report_version(&self) -> u32 {
        self.report_version
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn started_at_unix_ms(&self) -> u64 {
        self.started_at_unix_ms
    }

    pub fn ended_at_unix_ms(&self) -> u64 {
        self.ended_at_unix_ms
    }

    /// True iff no fatal step failed.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Results in execution order.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.result(name).map(StepResult::status)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn fatal_failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.is_fatal_failure())
    }

    /// Every step was already satisfied; nothing was changed.
    pub fn all_skipped(&self) -> bool {
        self.results.iter().all(|r| r.status == StepStatus::Skipped)
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (idx, result) in self.results.iter().enumerate() {
            let mut line = format!("{:02}. {:<8} {}", idx + 1, result.status, result.name);
            if !result.detail.is_empty() {
                line.push_str(": ");
                line.push_str(&result.detail);
            }
            lines.push(line);
        }
        lines.push(format!(
            "applied {} · skipped {} · failed {} · blocked {}",
            self.count(StepStatus::Applied),
            self.count(StepStatus::Skipped),
            self.count(StepStatus::Failed),
            self.count(StepStatus::Blocked),
        ));
        lines.push(if self.success {
            "Result: success".to_string()
        } else {
            "Result: FAILED".to_string()
        });
        lines
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
