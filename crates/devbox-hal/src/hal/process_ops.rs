//! Process execution helpers.
//!
//! External commands are considered "world-touching" and must go through the HAL so we can
//! test provisioning steps without spawning real processes.

use crate::HalResult;
use std::process::Output;
use std::time::Duration;

/// Process execution trait (external command runner).
pub trait ProcessOps {
    /// Run a command with captured stdout/stderr and a null stdin.
    ///
    /// A non-zero exit status is returned as `Ok`; callers decide what it means.
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration)
        -> HalResult<Output>;

    /// Run a command attached to the operator's terminal.
    ///
    /// Installers that ask questions (or print progress bars) need the real
    /// stdin/stdout. A non-zero exit status is an error.
    fn command_interactive(&self, program: &str, args: &[&str], timeout: Duration)
        -> HalResult<()>;

    /// Run a command and fail on a non-zero exit status.
    fn command_status(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<()> {
        let output = self.command_output(program, args, timeout)?;
        if !output.status.success() {
            return Err(crate::HalError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Run a command and return its trimmed stdout, failing on a non-zero exit status.
    fn command_stdout(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<String> {
        let output = self.command_output(program, args, timeout)?;
        if !output.status.success() {
            return Err(crate::HalError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }
}
