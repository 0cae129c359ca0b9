//! Server-to-client messages and their framing.

use crate::{END_OF_MESSAGE, LINE_DELIMITER};

/// A message the server sends to one client.
///
/// Replies and prompts end with the [`END_OF_MESSAGE`] marker on its own line
/// so a display layer knows the server is done talking. Relayed chat text is
/// sent bare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Prompt or one-shot reply (may span several lines)
    Reply(String),
    /// Conversation text relayed from the partner
    Chat(String),
}

impl Outbound {
    /// Text without framing.
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) | Self::Chat(text) => text,
        }
    }

    /// Whether this is a marker-terminated reply.
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }

    /// Wire encoding: the text with exactly one trailing delimiter, followed by
    /// the marker line for replies.
    pub fn encode(&self) -> String {
        let text = self.text().trim_end_matches(LINE_DELIMITER);
        match self {
            Self::Reply(_) => format!("{text}{LINE_DELIMITER}{END_OF_MESSAGE}{LINE_DELIMITER}"),
            Self::Chat(_) => format!("{text}{LINE_DELIMITER}"),
        }
    }
}
