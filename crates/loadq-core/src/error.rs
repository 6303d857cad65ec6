//! Load error types.
//!
//! These errors are designed to be cloneable and serializable so a single
//! error value can be handed to every listener on every thread. Foreign
//! errors (`std::io::Error`, HTTP client errors, image decoder errors) are
//! captured as strings at the boundary where they occur.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for loading operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadError {
    /// Connection or protocol failure reported by the transport.
    #[error("Transport error: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
        /// HTTP status code if the server answered.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// I/O error while reading or writing a body stream.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`UnexpectedEof`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Payload is not in the expected format.
    #[error("Decode error: {message}")]
    Decode {
        /// Detailed error message.
        message: String,
    },

    /// An operation is incompatible with the current state of a value,
    /// e.g. forcing GET on a request whose parts require POST.
    #[error("Invalid state: {message}")]
    State {
        /// Detailed error message.
        message: String,
    },

    /// The transfer was interrupted by `stop_work` or `cancel_current`.
    #[error("Transfer cancelled")]
    Cancelled,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl LoadError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a transport error carrying the HTTP status code.
    pub fn transport_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Connection, protocol and stream failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Io { .. })
    }

    /// Check if the payload could not be decoded.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport {
                message,
                status_code: Some(code),
            } => format!("Request failed (HTTP {code}): {message}"),
            Self::Transport { message, .. } => format!("Request failed: {message}"),
            Self::Io { message, .. } => format!("Stream failed: {message}"),
            Self::Decode { message } => format!("Unexpected response format: {message}"),
            Self::State { message } => message.clone(),
            Self::Cancelled => "Loading was cancelled.".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Convenience result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream ended");
        let err = LoadError::from_io_error(&io_err);

        match err {
            LoadError::Io { kind, message } => {
                assert_eq!(kind, "UnexpectedEof");
                assert!(message.contains("stream ended"));
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let err = LoadError::transport_with_status("not found", 404);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("404"));

        let parsed: LoadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_taxonomy() {
        assert!(LoadError::transport("reset").is_transport());
        assert!(LoadError::io("BrokenPipe", "gone").is_transport());
        assert!(LoadError::decode("not an image").is_decode());
        assert!(!LoadError::state("POST only").is_transport());
        assert!(LoadError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_user_messages() {
        let err = LoadError::transport_with_status("forbidden", 403);
        assert!(err.user_message().contains("403"));
        assert_eq!(
            LoadError::Cancelled.user_message(),
            "Loading was cancelled."
        );
    }
}
