//! Error types for the tandem core.
//!
//! Two layers: [`SessionError`] for illegal lifecycle transitions (always a
//! server bug) and [`Rejection`] for client operations the protocol refuses
//! (always answered with a reply, never fatal).

use tandem_proto::{Outbound, ParseError, replies};
use thiserror::Error;

use crate::session::Lifecycle;

/// Errors from session state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current lifecycle state when the error occurred
        state: Lifecycle,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// A client operation the protocol refuses.
///
/// Every rejection produces exactly one reply to the initiator and leaves all
/// session state untouched. Callers that must also notify a third party
/// (a target that was already paired) do so themselves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown command, malformed `/connect`, empty line
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// Chat text without a partner
    #[error("not paired")]
    NotPaired,

    /// Chat text or `/vote` from the listening side
    #[error("not the current speaker")]
    NotSpeaker,

    /// `/connect` target is not logged in
    #[error("target not found")]
    TargetNotFound,

    /// `/connect` target already has a request waiting
    #[error("target has a pending request")]
    TargetBusyPending,

    /// `/connect` target is mid-conversation
    #[error("target already paired")]
    TargetAlreadyPaired,

    /// `/connect` to one's own identity
    #[error("cannot connect to self")]
    SelfConnect,

    /// `/connect` issued while already paired
    #[error("requester already in a conversation")]
    AlreadyInConversation,

    /// Answer arrived after the requester disconnected
    #[error("requester gone")]
    RequesterGone,

    /// Answer arrived after the requester paired with someone else
    #[error("requester {0} is busy")]
    RequesterBusy(String),
}

impl Rejection {
    /// Reply sent to the initiator.
    pub fn reply(&self) -> Outbound {
        match self {
            Self::Protocol(ParseError::EmptyLine) => replies::empty_message(),
            Self::Protocol(ParseError::MissingIdentity) => replies::connect_usage(),
            Self::Protocol(ParseError::UnknownCommand(_) | ParseError::UnexpectedArgument { .. }) => {
                replies::usage()
            },
            Self::NotPaired => replies::not_paired(),
            Self::NotSpeaker => replies::not_speaker(),
            Self::TargetNotFound => replies::target_not_found(),
            Self::TargetBusyPending => replies::target_busy(),
            Self::TargetAlreadyPaired => replies::target_already_paired(),
            Self::SelfConnect => replies::self_connect(),
            Self::AlreadyInConversation => replies::already_in_conversation(),
            Self::RequesterGone => replies::requester_gone(),
            Self::RequesterBusy(requester) => replies::requester_busy(requester),
        }
    }
}
