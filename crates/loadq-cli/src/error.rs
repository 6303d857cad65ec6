//! CLI-specific error types and exit codes.

use loadq_core::LoadError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more requests did not finish.
    #[error("{failed} of {total} requests failed")]
    Incomplete { failed: usize, total: usize },

    /// Loader error outside any single request.
    #[error("{0}")]
    Load(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// - 1: General error
    /// - 2: Invalid arguments
    /// - 74, 78: `EX_IOERR`, `EX_CONFIG` from sysexits.h
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Incomplete { .. } | Self::Load(_) => 1,
            Self::Arguments(_) => 2,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { message, .. } => Self::Io(message),
            LoadError::State { message } => Self::Arguments(message),
            other => Self::Load(other.user_message()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
