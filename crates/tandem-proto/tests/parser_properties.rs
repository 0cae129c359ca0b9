//! Property-based tests for line classification.

use proptest::prelude::*;
use tandem_proto::{Answer, ClientInput, Command, Outbound, ParseError};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Property: the parser never panics and only produces text for lines that
    /// do not start with '/'.
    #[test]
    fn prop_parse_total(line in ".{0,200}") {
        match ClientInput::parse(&line) {
            Ok(ClientInput::Text(text)) => {
                prop_assert!(!text.starts_with('/'));
                prop_assert_eq!(text.as_str(), line.trim());
            },
            Ok(ClientInput::Command(_)) => prop_assert!(line.trim().starts_with('/')),
            Err(ParseError::EmptyLine) => prop_assert!(line.trim().is_empty()),
            Err(_) => prop_assert!(line.trim().starts_with('/')),
        }
    }

    /// Property: `/connect <id>` round-trips any whitespace-free identity.
    #[test]
    fn prop_connect_extracts_identity(identity in "[A-Za-z0-9_@.-]{1,32}") {
        let parsed = ClientInput::parse(&format!("/connect {identity}"));
        prop_assert_eq!(parsed, Ok(ClientInput::Command(Command::Connect(identity))));
    }

    /// Property: anything other than "yes" declines.
    #[test]
    fn prop_answer_declines_non_yes(line in ".{0,20}") {
        let expected = if line.trim() == "yes" { Answer::Accept } else { Answer::Decline };
        prop_assert_eq!(Answer::parse(&line), expected);
    }

    /// Property: encoded replies always end with the marker line and chat
    /// never contains it as a trailing line.
    #[test]
    fn prop_reply_framing(text in "[^\n]{0,80}") {
        let reply = Outbound::Reply(text.clone()).encode();
        prop_assert!(reply.ends_with("\n*ENDM*\n"));

        let chat = Outbound::Chat(text).encode();
        prop_assert!(chat.ends_with('\n'));
        prop_assert!(!chat.ends_with("\n*ENDM*\n"));
    }
}
