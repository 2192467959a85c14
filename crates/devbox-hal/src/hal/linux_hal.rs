//! Linux HAL implementation using real processes and the real filesystem.

use super::{HostInfoOps, OsReleaseInfo, ProcessOps};
use crate::os_release::parse_os_release;
use crate::path::find_executable_in_path;
use crate::{HalError, HalResult};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

const DEFAULT_OS_RELEASE: &str = "/etc/os-release";

/// Real HAL implementation for Linux workstations.
#[derive(Debug, Clone)]
pub struct LinuxHal {
    os_release_path: PathBuf,
}

impl Default for LinuxHal {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHal {
    pub fn new() -> Self {
        Self {
            os_release_path: PathBuf::from(DEFAULT_OS_RELEASE),
        }
    }

    pub fn with_os_release_path(path: impl Into<PathBuf>) -> Self {
        Self {
            os_release_path: path.into(),
        }
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    match err.kind() {
        std::io::ErrorKind::NotFound => HalError::CommandNotFound(program.to_string()),
        std::io::ErrorKind::PermissionDenied => HalError::PermissionDenied,
        _ => HalError::Io(err),
    }
}

/// How long to keep reading output once the command itself is gone.
/// Background children may hold the pipes open indefinitely.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// A pipe drained on its own thread into a shared buffer.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();
        std::thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = sink.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait for EOF until `deadline`, then take whatever has been read.
    fn collect(self, deadline: Instant) -> Vec<u8> {
        let wait = deadline.saturating_duration_since(Instant::now());
        if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(wait) {
            log::debug!("output pipe still held open; returning partial output");
        }
        self.buf
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

/// SIGKILL the child's whole process group, then reap the child.
fn kill_group(program: &str, child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(err) = killpg(pgid, Signal::SIGKILL) {
        log::debug!("killpg {} ({}): {}", program, pgid, err);
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout = PipeReader::spawn(child.stdout.take());
    let stderr = PipeReader::spawn(child.stderr.take());

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            kill_group(program, &mut child);
            let deadline = Instant::now() + PIPE_GRACE;
            let _ = stdout.collect(deadline);
            let _ = stderr.collect(deadline);
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let deadline = Instant::now() + PIPE_GRACE;
    Ok(Output {
        status,
        stdout: stdout.collect(deadline),
        stderr: stderr.collect(deadline),
    })
}

impl ProcessOps for LinuxHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        log::debug!("exec: {} {}", program, args.join(" "));
        let mut cmd = Command::new(program);
        cmd.args(args);
        output_with_timeout(program, &mut cmd, timeout)
    }

    fn command_interactive(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<()> {
        log::debug!("exec (interactive): {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|e| map_command_err(program, e))?;

        let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HalError::CommandTimeout {
                    program: program.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };
        if !status.success() {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

impl HostInfoOps for LinuxHal {
    fn os_release(&self) -> HalResult<OsReleaseInfo> {
        let content = fs::read_to_string(&self.os_release_path)?;
        Ok(parse_os_release(&content))
    }

    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let path_env = std::env::var("PATH").unwrap_or_default();
        find_executable_in_path(name, &path_env)
    }

    fn path_exists(&self, path: &Path) -> HalResult<bool> {
        path.try_exists().map_err(|err| match err.kind() {
            std::io::ErrorKind::PermissionDenied => HalError::PermissionDenied,
            _ => HalError::Io(err),
        })
    }
}
