//! Protocol parse errors.

use thiserror::Error;

/// Errors produced while classifying a client line.
///
/// All of these are recoverable: the server answers with a usage reply and
/// leaves session state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line was empty after trimming.
    #[error("empty line")]
    EmptyLine,

    /// A `/`-prefixed token that is not a known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// `/connect` without a target identity.
    #[error("missing identity for /connect")]
    MissingIdentity,

    /// A command that takes no argument was given one.
    #[error("unexpected argument for {command}: {argument}")]
    UnexpectedArgument {
        /// Command that was given the argument
        command: &'static str,
        /// The stray argument
        argument: String,
    },
}
