//! Persistent run report artifact.
//!
//! Every `devbox run` leaves its `RunReport` as JSON so the last outcome can
//! be inspected later (`devbox last`). Default path:
//! `/var/log/devbox/run-report.json` (override via `DEVBOX_REPORT_PATH` or
//! `--report`). Dry runs go next to it (`run-report.dry-run.json`) so they
//! never replace the outcome of the last real run.

use anyhow::Context;
use devbox_workflow::RunReport;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REPORT_PATH: &str = "/var/log/devbox/run-report.json";
pub const REPORT_PATH_ENV: &str = "DEVBOX_REPORT_PATH";

/// `--report` wins, then `DEVBOX_REPORT_PATH`, then the default.
pub fn report_path(cli_override: Option<&Path>) -> PathBuf {
    cli_override
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(REPORT_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH))
}

/// Where a dry run's report goes, given the real report path.
pub fn dry_run_report_path(report_path: &Path) -> PathBuf {
    report_path.with_extension("dry-run.json")
}

pub fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    write_json_atomic(path, report).context("failed to persist run report")
}

pub fn read_report(path: &Path) -> anyhow::Result<RunReport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read run report {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse run report {}", path.display()))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create report directory: {}", parent.display())
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    fs::write(&tmp, payload).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to atomically replace {}", path.display()))?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbox_workflow::{Sequencer, StepDefinition, StepError, StepStatus};
    use tempfile::tempdir;

    fn sample_report() -> RunReport {
        let steps = vec![
            StepDefinition::new("git", || Ok(true), |_| Ok(())),
            StepDefinition::new("docker", || Ok(false), |_| Err(StepError::apply("exit 100")))
                .fatal(true),
        ];
        Sequencer::new(false).run(&steps).unwrap()
    }

    #[test]
    fn report_writes_atomic_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/run-report.json");
        let report = sample_report();

        write_report(&path, &report).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let back = read_report(&path).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.status_of("docker"), Some(StepStatus::Failed));
        assert!(!back.success());
    }

    #[test]
    fn cli_override_beats_environment() {
        let _guard = crate::test_env::lock();
        let dir = tempdir().unwrap();
        let from_env = dir.path().join("env.json");
        std::env::set_var(REPORT_PATH_ENV, &from_env);

        assert_eq!(report_path(None), from_env);
        let explicit = dir.path().join("cli.json");
        assert_eq!(report_path(Some(&explicit)), explicit);

        std::env::remove_var(REPORT_PATH_ENV);
        assert_eq!(report_path(None), PathBuf::from(DEFAULT_REPORT_PATH));
    }

    #[test]
    fn dry_run_report_sits_beside_the_real_one() {
        let real = PathBuf::from("/var/log/devbox/run-report.json");
        let dry = dry_run_report_path(&real);
        assert_eq!(dry, PathBuf::from("/var/log/devbox/run-report.dry-run.json"));
        assert_ne!(dry, real);
    }

    #[test]
    fn missing_report_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(read_report(&dir.path().join("nope.json")).is_err());
    }
}
