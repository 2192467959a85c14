use std::io;
use thiserror::Error;

pub type HalResult<T> = Result<T, HalError>;
pub type StepResult<T> = Result<T, StepError>;

#[derive(Error, Debug)]
pub enum HalError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Command failed: {program} (exit={code:?}): {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command timed out: {program} after {timeout_secs}s")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("nix errno: {0}")]
    Nix(#[from] nix::errno::Errno),

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

/// Malformed step graph. Raised before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Step name must not be empty (position {0})")]
    EmptyName(usize),

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{0}' depends on itself")]
    SelfDependency(String),

    #[error("Dependency cycle between steps: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

/// Failure raised by a step's apply action.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Apply(#[from] anyhow::Error),

    #[error("Operator declined: {0}")]
    OperatorDeclined(String),
}

impl StepError {
    pub fn apply(msg: impl Into<String>) -> Self {
        StepError::Apply(anyhow::anyhow!(msg.into()))
    }

    /// Declining a required action always stops dependent steps.
    pub fn forces_fatal(&self) -> bool {
        matches!(self, StepError::OperatorDeclined(_))
    }
}

impl From<HalError> for StepError {
    fn from(err: HalError) -> Self {
        StepError::Apply(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = ConfigurationError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Dependency cycle between steps: a -> b -> a");
    }

    #[test]
    fn only_declines_force_fatal() {
        assert!(StepError::OperatorDeclined("restart".into()).forces_fatal());
        assert!(!StepError::apply("boom").forces_fatal());
        let hal: StepError = HalError::CommandNotFound("apt-get".into()).into();
        assert!(!hal.forces_fatal());
        assert_eq!(hal.to_string(), "Command not found: apt-get");
    }
}
