//! Storage error types.

use thiserror::Error;

/// Errors from transcript storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend I/O failed (disk, database transaction, injected chaos).
    ///
    /// May be transient. The driver logs it and carries on without history.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be interpreted as a transcript.
    #[error("corrupt transcript: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::InvalidData {
            Self::Corrupt(err.to_string())
        } else {
            Self::Io(err.to_string())
        }
    }
}
