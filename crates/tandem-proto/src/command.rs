//! Inbound line classification.
//!
//! Client lines are either a slash command or free text. The parser works on
//! the trimmed line and never allocates more than the argument it extracts.

use crate::errors::ParseError;

/// A post-authentication slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect <identity>`: ask another client for a conversation
    Connect(String),
    /// `/vote`: pass the speaking turn to the partner
    Vote,
    /// `/end`: leave the current conversation
    End,
    /// `/help`: show the command list
    Help,
    /// `/exit`: close the connection
    Exit,
}

impl Command {
    /// Wire token for this command, including the leading slash.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Connect(_) => "/connect",
            Self::Vote => "/vote",
            Self::End => "/end",
            Self::Help => "/help",
            Self::Exit => "/exit",
        }
    }
}

/// A classified line from an authenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// A slash command
    Command(Command),
    /// Conversation text to relay to the partner
    Text(String),
}

impl ClientInput {
    /// Classify one line.
    ///
    /// Surrounding whitespace (including a stray `\r`) is ignored. A line that
    /// starts with `/` must be a known command; anything else is text.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::EmptyLine);
        }

        if !line.starts_with('/') {
            return Ok(Self::Text(line.to_string()));
        }

        let (token, rest) = match line.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (line, ""),
        };

        let command = match token {
            "/connect" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingIdentity);
                }
                Command::Connect(rest.to_string())
            },
            "/vote" => no_argument(Command::Vote, rest)?,
            "/end" => no_argument(Command::End, rest)?,
            "/help" => no_argument(Command::Help, rest)?,
            "/exit" => no_argument(Command::Exit, rest)?,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        Ok(Self::Command(command))
    }
}

fn no_argument(command: Command, rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::UnexpectedArgument { command: command.token(), argument: rest.to_string() })
    }
}

/// Reply to a pending pairing request.
///
/// Only the exact word `yes` accepts. Everything else, including an empty
/// line, declines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Pair with the requester
    Accept,
    /// Turn the request down
    Decline,
}

impl Answer {
    /// Interpret a trimmed line as an answer.
    pub fn parse(line: &str) -> Self {
        if line.trim() == "yes" { Self::Accept } else { Self::Decline }
    }
}

/// Command read from the local operator channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Notify every authenticated client, close all connections, stop.
    Shutdown,
    /// Anything else; logged and ignored.
    Unknown(String),
}

impl OperatorCommand {
    /// Interpret one operator line.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "shutdown" => Self::Shutdown,
            other => Self::Unknown(other.to_string()),
        }
    }
}
