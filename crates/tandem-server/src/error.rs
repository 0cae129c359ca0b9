//! Server error types.

use std::fmt;

use crate::{server_error::DriverError, storage::StorageError};

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing bot token, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    Transport(String),

    /// Internal error (event loop died, thread spawn failed).
    ///
    /// Should never happen in a correct implementation. Indicates a bug.
    Internal(String),

    /// Driver error (from `ServerDriver` processing).
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Config(format!("transcript storage unavailable: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_category() {
        assert_eq!(ServerError::Config("no token".into()).to_string(), "configuration error: no token");
        assert_eq!(
            ServerError::from(std::io::Error::other("boom")).to_string(),
            "transport error: boom"
        );
        assert_eq!(
            ServerError::from(DriverError::ShuttingDown).to_string(),
            "driver error: server is shutting down"
        );
    }

    #[test]
    fn driver_error_is_source() {
        use std::error::Error;
        let err = ServerError::from(DriverError::ShuttingDown);
        assert!(err.source().is_some());
        assert!(ServerError::Internal("x".into()).source().is_none());
    }
}
