//! Fuzz target for the server driver's line handling.
//!
//! A scripted population of sessions sends arbitrary lines, connects, drops
//! and logs in again, in any order.
//!
//! # Invariants
//!
//! - The driver never panics and never reports an error for a live session
//! - Partners point at each other and exactly one of them speaks
//! - The identity index holds only authenticated, live sessions
//! - Nothing is sent to a session after it was closed

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tandem_core::SessionId;
use tandem_server::{
    DriverConfig, MemoryAuthenticator, MemoryTranscripts, ServerAction, ServerDriver,
    ServerEvent, SystemEnv,
};

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Line { who: u8, line: String },
    Login { who: u8, identity: u8 },
    Request { who: u8, target: u8 },
    Answer { who: u8, yes: bool },
    Drop { who: u8 },
    Shutdown,
}

fn identity(n: u8) -> String {
    format!("user{}", n % 4)
}

type Driver = ServerDriver<SystemEnv, MemoryAuthenticator, MemoryTranscripts>;

fn feed(driver: &mut Driver, closed: &mut HashSet<SessionId>, session: SessionId, line: &str) {
    let actions = driver
        .process_event(ServerEvent::LineReceived { session, line: line.to_string() })
        .unwrap();
    apply(closed, &actions);
}

fn apply(closed: &mut HashSet<SessionId>, actions: &[ServerAction]) {
    for action in actions {
        match action {
            ServerAction::Send { session, .. } => assert!(!closed.contains(session)),
            ServerAction::Close { session, .. } => {
                closed.insert(*session);
            },
            ServerAction::Log { .. } | ServerAction::Terminate => {},
        }
    }
}

fn check(driver: &Driver) {
    let registry = driver.registry();
    for session in registry.iter() {
        let Some(member) = session.member() else { continue };
        assert_eq!(registry.session_for(member.identity()), Some(session.id()));
        if let Some(partner) = registry.partner_of(session.id()) {
            let other = registry.member(partner).unwrap();
            assert_eq!(other.partner(), Some(member.identity()));
            assert_ne!(other.is_speaker(), member.is_speaker());
            assert!(member.pending_request_from().is_none());
        }
    }
    for (identity, id) in registry.identities() {
        assert_eq!(registry.get(id).and_then(|s| s.identity()), Some(identity));
    }
}

fuzz_target!(|steps: Vec<Step>| {
    let mut driver = ServerDriver::new(
        SystemEnv::new(),
        MemoryAuthenticator::new(),
        MemoryTranscripts::new(),
        DriverConfig { max_connections: 8 },
    );
    let mut sessions: Vec<SessionId> = Vec::new();
    let mut closed = HashSet::new();

    for step in steps.into_iter().take(256) {
        let live: Vec<SessionId> =
            sessions.iter().copied().filter(|s| driver.registry().contains(*s)).collect();
        let pick = |who: u8| (!live.is_empty()).then(|| live[who as usize % live.len()]);

        match step {
            Step::Connect => {
                if let Ok((session, actions)) = driver.accept_connection() {
                    sessions.push(session);
                    apply(&mut closed, &actions);
                }
            },
            Step::Line { who, line } => {
                if let Some(session) = pick(who) {
                    feed(&mut driver, &mut closed, session, &line);
                }
            },
            Step::Login { who, identity: n } => {
                if let Some(session) = pick(who) {
                    let name = identity(n);
                    feed(&mut driver, &mut closed, session, &name);
                    if let Some(code) = driver.authenticator().last_code(&name) {
                        if driver.registry().contains(session) {
                            feed(&mut driver, &mut closed, session, &code);
                        }
                    }
                }
            },
            Step::Request { who, target } => {
                if let Some(session) = pick(who) {
                    feed(&mut driver, &mut closed, session, &format!("/connect {}", identity(target)));
                }
            },
            Step::Answer { who, yes } => {
                if let Some(session) = pick(who) {
                    feed(&mut driver, &mut closed, session, if yes { "yes" } else { "no" });
                }
            },
            Step::Drop { who } => {
                if let Some(session) = pick(who) {
                    let actions = driver
                        .process_event(ServerEvent::ConnectionClosed {
                            session,
                            reason: "fuzz".to_string(),
                        })
                        .unwrap();
                    apply(&mut closed, &actions);
                }
            },
            Step::Shutdown => {
                let actions = driver.process_event(ServerEvent::Shutdown).unwrap();
                apply(&mut closed, &actions);
            },
        }

        check(&driver);
    }
});
