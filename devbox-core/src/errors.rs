use devbox_error::ConfigurationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevboxError {
    #[error("Catalogue validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid step graph: {0}")]
    Graph(#[from] ConfigurationError),
}

impl DevboxError {
    /// Process exit status for errors that stop devbox before any step runs.
    pub fn exit_code(&self) -> u8 {
        match self {
            DevboxError::ValidationFailed(_) | DevboxError::Graph(_) => 2,
        }
    }
}
