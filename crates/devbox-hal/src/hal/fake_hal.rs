//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or a real workstation.
//! Commands can be scripted to fail, to print output, or to "install"
//! executables and paths so later probes see the new state.

use super::{HostInfoOps, OsReleaseInfo, ProcessOps};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command {
        program: String,
        args: Vec<String>,
        timeout_secs: u64,
        interactive: bool,
    },
    OsRelease,
    FindExecutable {
        name: String,
    },
    PathExists {
        path: PathBuf,
    },
}

impl Operation {
    /// `program arg1 arg2` for command operations.
    pub fn command_line(&self) -> Option<String> {
        match self {
            Operation::Command { program, args, .. } => {
                let mut line = program.clone();
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                Some(line)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ScriptedOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Clone)]
enum Effect {
    Executable(String),
    Path(PathBuf),
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    executables: HashSet<String>,
    paths: HashSet<PathBuf>,
    unreadable_paths: HashSet<PathBuf>,
    os_release: Option<OsReleaseInfo>,
    root: bool,
    /// Keyed by full command line.
    outputs: HashMap<String, ScriptedOutput>,
    missing_programs: HashSet<String>,
    /// Command-line prefix -> state change applied on success.
    effects: Vec<(String, Effect)>,
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeHalState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Command lines of every recorded command, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .operations
            .iter()
            .filter_map(Operation::command_line)
            .collect()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.lock().operations.iter().any(check)
    }

    /// Clear all recorded operations (scripted state is kept).
    pub fn clear(&self) {
        self.lock().operations.clear();
    }

    pub fn set_root(&self, root: bool) {
        self.lock().root = root;
    }

    pub fn set_os_release(&self, id: &str, version_id: Option<&str>) {
        self.lock().os_release = Some(OsReleaseInfo {
            id: Some(id.to_string()),
            id_like: Vec::new(),
            version_id: version_id.map(str::to_string),
        });
    }

    pub fn add_executable(&self, name: &str) {
        self.lock().executables.insert(name.to_string());
    }

    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.lock().paths.insert(path.into());
    }

    /// Make `path_exists` fail with a permission error for this path.
    pub fn deny_path(&self, path: impl Into<PathBuf>) {
        self.lock().unreadable_paths.insert(path.into());
    }

    /// Script the result of an exact command line (`program arg1 arg2`).
    pub fn script_command(&self, command_line: &str, code: i32, stdout: &str, stderr: &str) {
        self.lock().outputs.insert(
            command_line.to_string(),
            ScriptedOutput {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Make spawning `program` fail as if it was not installed.
    pub fn remove_program(&self, program: &str) {
        self.lock().missing_programs.insert(program.to_string());
    }

    /// When a command starting with `prefix` succeeds, `executable` appears on PATH.
    pub fn command_provides_executable(&self, prefix: &str, executable: &str) {
        self.lock()
            .effects
            .push((prefix.to_string(), Effect::Executable(executable.to_string())));
    }

    /// When a command starting with `prefix` succeeds, `path` starts to exist.
    pub fn command_provides_path(&self, prefix: &str, path: impl Into<PathBuf>) {
        self.lock()
            .effects
            .push((prefix.to_string(), Effect::Path(path.into())));
    }

    fn record_operation(&self, op: Operation) {
        self.lock().operations.push(op);
    }

    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        interactive: bool,
    ) -> HalResult<ScriptedOutput> {
        let op = Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: timeout.as_secs(),
            interactive,
        };
        let line = op.command_line().unwrap_or_default();
        self.record_operation(op);

        let mut state = self.lock();
        if state.missing_programs.contains(program) {
            return Err(HalError::CommandNotFound(program.to_string()));
        }
        let scripted = state.outputs.get(&line).cloned().unwrap_or_default();
        if scripted.code == 0 {
            let effects: Vec<Effect> = state
                .effects
                .iter()
                .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, effect)| effect.clone())
                .collect();
            for effect in effects {
                match effect {
                    Effect::Executable(name) => {
                        state.executables.insert(name);
                    }
                    Effect::Path(path) => {
                        state.paths.insert(path);
                    }
                }
            }
        }
        Ok(scripted)
    }
}

fn exit_status(code: i32) -> std::process::ExitStatus {
    std::process::ExitStatus::from_raw(code << 8)
}

impl ProcessOps for FakeHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        let scripted = self.run(program, args, timeout, false)?;
        Ok(Output {
            status: exit_status(scripted.code),
            stdout: scripted.stdout.into_bytes(),
            stderr: scripted.stderr.into_bytes(),
        })
    }

    fn command_interactive(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<()> {
        let scripted = self.run(program, args, timeout, true)?;
        if scripted.code != 0 {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: Some(scripted.code),
                stderr: scripted.stderr,
            });
        }
        Ok(())
    }
}

impl HostInfoOps for FakeHal {
    fn os_release(&self) -> HalResult<OsReleaseInfo> {
        self.record_operation(Operation::OsRelease);
        self.lock()
            .os_release
            .clone()
            .ok_or_else(|| HalError::Parse("os-release not available".to_string()))
    }

    fn is_root(&self) -> bool {
        self.lock().root
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.record_operation(Operation::FindExecutable {
            name: name.to_string(),
        });
        let state = self.lock();
        state
            .executables
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    fn path_exists(&self, path: &Path) -> HalResult<bool> {
        self.record_operation(Operation::PathExists {
            path: path.to_path_buf(),
        });
        let state = self.lock();
        if state.unreadable_paths.contains(path) {
            return Err(HalError::PermissionDenied);
        }
        Ok(state.paths.contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(5);

    #[test]
    fn records_commands_in_order() {
        let hal = FakeHal::new();
        hal.command_status("apt-get", &["update"], T).unwrap();
        hal.command_status("apt-get", &["install", "-y", "git"], T)
            .unwrap();
        assert_eq!(
            hal.commands(),
            vec!["apt-get update", "apt-get install -y git"]
        );
    }

    #[test]
    fn scripted_failure_surfaces_as_command_failed() {
        let hal = FakeHal::new();
        hal.script_command("docker info", 1, "", "daemon not running");
        let err = hal.command_status("docker", &["info"], T).unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { code: Some(1), .. }));
    }

    #[test]
    fn successful_command_applies_effects() {
        let hal = FakeHal::new();
        hal.command_provides_executable("apt-get install -y docker.io", "docker");
        assert!(hal.find_executable("docker").is_none());
        hal.command_status("apt-get", &["install", "-y", "docker.io"], T)
            .unwrap();
        assert!(hal.find_executable("docker").is_some());
    }

    #[test]
    fn denied_path_reports_permission_error() {
        let hal = FakeHal::new();
        hal.deny_path("/root/.vendor");
        assert!(matches!(
            hal.path_exists(Path::new("/root/.vendor")),
            Err(HalError::PermissionDenied)
        ));
    }
}
