//! Driver error types.
//!
//! Everything a client can get wrong is answered with a reply and never shows
//! up here. These errors are about the event stream itself: events for
//! sessions that no longer exist, admission refusals, and transitions the
//! driver should never attempt.

use std::fmt;

use tandem_core::{SessionError, SessionId};

/// Errors returned by `ServerDriver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in registry.
    ///
    /// A line raced with the session's close. Transient and harmless; the
    /// runtime drops the event.
    SessionNotFound(SessionId),

    /// Connection refused because `max_connections` sessions are live.
    CapacityExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Connection refused because shutdown has started.
    ShuttingDown,

    /// Illegal session transition.
    ///
    /// Indicates a driver bug. The session is left as it was.
    Session(SessionError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::CapacityExceeded { limit } => {
                write!(f, "connection limit reached ({limit} sessions)")
            },
            Self::ShuttingDown => write!(f, "server is shutting down"),
            Self::Session(err) => write!(f, "session error: {err}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for DriverError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

#[cfg(test)]
mod tests {
    use tandem_core::Lifecycle;

    use super::*;

    #[test]
    fn driver_error_display() {
        let err = DriverError::SessionNotFound(SessionId::new(4, 2));
        assert_eq!(err.to_string(), "session not found: 4.2");

        let err = DriverError::CapacityExceeded { limit: 10 };
        assert_eq!(err.to_string(), "connection limit reached (10 sessions)");

        let err = DriverError::from(SessionError::InvalidState {
            state: Lifecycle::Connecting,
            operation: "authenticate",
        });
        assert_eq!(
            err.to_string(),
            "session error: invalid state transition: cannot authenticate from Connecting"
        );
    }
}
