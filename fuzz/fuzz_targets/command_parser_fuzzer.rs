//! Fuzz target for the client and operator line parsers.
//!
//! Any UTF-8 line must parse to a command, chat text, or a `ParseError` whose
//! reply is a usage message. The parsers should NEVER panic.
//!
//! # Invariants
//!
//! - Chat text is the trimmed line and never starts with `/`
//! - `/connect` targets are non-empty and trimmed
//! - Parsing is insensitive to surrounding whitespace

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_core::Rejection;
use tandem_proto::{Answer, ClientInput, Command, OperatorCommand};

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    match ClientInput::parse(line) {
        Ok(ClientInput::Text(text)) => {
            assert_eq!(text, line.trim());
            assert!(!text.starts_with('/'));
        },
        Ok(ClientInput::Command(Command::Connect(target))) => {
            assert!(!target.is_empty());
            assert_eq!(target, target.trim());
        },
        Ok(ClientInput::Command(_)) => {},
        Err(e) => {
            assert!(Rejection::from(e).reply().is_reply());
        },
    }

    assert_eq!(ClientInput::parse(line), ClientInput::parse(&format!("  {line}\t")));

    let _ = Answer::parse(line);
    let _ = OperatorCommand::parse(line);
});
