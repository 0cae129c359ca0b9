//! Tandem line protocol.
//!
//! Everything a tandem peer says on the wire is a newline-terminated UTF-8
//! line. This crate owns the vocabulary of that protocol and nothing else:
//!
//! - [`ClientInput`] / [`Command`]: what an authenticated client typed, parsed
//!   into a closed enum so the server dispatches exhaustively.
//! - [`Answer`]: the yes/no reply to a pending pairing request.
//! - [`OperatorCommand`]: lines read from the local operator channel.
//! - [`Outbound`]: what the server sends back, and how it is framed.
//! - [`replies`]: every fixed text the server can send.
//!
//! No I/O happens here. The server runtime reads lines, hands them to the
//! parser, and writes [`Outbound::encode`]d text back to the socket.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod errors;
pub mod outbound;
pub mod replies;

pub use command::{Answer, ClientInput, Command, OperatorCommand};
pub use errors::ParseError;
pub use outbound::Outbound;

/// Marker line that terminates a prompt or one-shot reply.
///
/// Lets a display layer tell informational output apart from relayed chat
/// text, which is never followed by the marker.
pub const END_OF_MESSAGE: &str = "*ENDM*";

/// Maximum accepted length of one inbound line, in bytes (excluding the
/// delimiter). Longer lines are a transport failure.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Line delimiter used in both directions.
pub const LINE_DELIMITER: char = '\n';
