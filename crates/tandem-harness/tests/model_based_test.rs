//! Model-based property tests.
//!
//! proptest generates random operation sequences over a handful of clients.
//! `SimServer` checks the registry invariants after every event; the test
//! additionally checks what each operation delivered against what the
//! protocol allows.
//!
//! ```text
//! proptest generates: Vec<Op>
//!                       │
//!                       ▼
//!     SimServer (driver + invariants after every event)
//!                       │
//!                       ▼
//!     per-op delivery checks (relay, single reply, silence after close)
//! ```

use std::collections::HashSet;

use proptest::prelude::*;
use tandem_core::{PairKey, SessionId};
use tandem_harness::SimServer;
use tandem_proto::{Outbound, replies};

const CLIENTS: u8 = 4;

#[derive(Debug, Clone)]
enum Op {
    Login(u8),
    Connect(u8, u8),
    Answer(u8, bool),
    Vote(u8),
    End(u8),
    Say(u8),
    Garbage(u8),
    Exit(u8),
    Drop(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let client = 0..CLIENTS;
    prop_oneof![
        3 => client.clone().prop_map(Op::Login),
        4 => (client.clone(), 0..CLIENTS).prop_map(|(a, b)| Op::Connect(a, b)),
        3 => (client.clone(), any::<bool>()).prop_map(|(a, yes)| Op::Answer(a, yes)),
        2 => client.clone().prop_map(Op::Vote),
        1 => client.clone().prop_map(Op::End),
        4 => client.clone().prop_map(Op::Say),
        1 => client.clone().prop_map(Op::Garbage),
        1 => client.clone().prop_map(Op::Exit),
        1 => client.prop_map(Op::Drop),
    ]
}

fn name(client: u8) -> String {
    format!("user{client}")
}

struct World {
    server: SimServer,
    /// Current session per client, if connected
    slots: Vec<Option<SessionId>>,
    /// Every session ever opened
    opened: Vec<SessionId>,
}

impl World {
    fn new() -> Self {
        Self { server: SimServer::new(), slots: vec![None; CLIENTS as usize], opened: Vec::new() }
    }

    fn live(&self, client: u8) -> Option<SessionId> {
        self.slots[client as usize].filter(|s| !self.server.is_closed(*s))
    }

    fn drain_all(&mut self) -> Vec<(SessionId, Vec<Outbound>)> {
        self.opened.iter().map(|s| (*s, self.server.take(*s))).collect()
    }

    fn line(&mut self, client: u8, text: &str) {
        if let Some(session) = self.live(client) {
            self.server.send(session, text).unwrap();
        }
    }
}

fn run(ops: &[Op]) -> Result<(), TestCaseError> {
    let mut world = World::new();

    for op in ops {
        world.drain_all();
        let closed_before: HashSet<SessionId> =
            world.opened.iter().copied().filter(|s| world.server.is_closed(*s)).collect();

        match op {
            Op::Login(c) => {
                let session = world.server.login(&name(*c)).unwrap();
                world.opened.push(session);
                world.slots[*c as usize] = Some(session);
                prop_assert_eq!(world.server.registry().session_for(&name(*c)), Some(session));
            },
            Op::Connect(a, b) => world.line(*a, &format!("/connect {}", name(*b))),
            Op::Answer(c, yes) => world.line(*c, if *yes { "yes" } else { "no" }),
            Op::Vote(c) => check_vote(&mut world, *c)?,
            Op::End(c) => world.line(*c, "/end"),
            Op::Say(c) => check_say(&mut world, *c)?,
            Op::Garbage(c) => world.line(*c, "/dance"),
            Op::Exit(c) => world.line(*c, "/exit"),
            Op::Drop(c) => {
                if let Some(session) = world.live(*c) {
                    world.server.drop_connection(session).unwrap();
                    prop_assert!(world.server.registry().get(session).is_none());
                }
            },
        }

        for (session, delivered) in world.drain_all() {
            if closed_before.contains(&session) {
                prop_assert!(delivered.is_empty(), "{} got {:?} after close", session, delivered);
            }
        }
    }
    Ok(())
}

/// A listener's `/vote` is refused with exactly one reply and changes nothing.
fn check_vote(world: &mut World, client: u8) -> Result<(), TestCaseError> {
    let Some(session) = world.live(client) else { return Ok(()) };
    let member = world.server.registry().member(session).cloned();
    let answering = member.as_ref().is_some_and(|m| m.pending_request_from().is_some());

    world.line(client, "/vote");

    if let Some(member) = member.filter(|m| m.is_paired() && !m.is_speaker() && !answering) {
        prop_assert_eq!(world.server.take(session), vec![replies::not_speaker()]);
        prop_assert_eq!(world.server.registry().member(session), Some(&member));
    }
    Ok(())
}

/// Speaker text reaches only the partner and the transcript; anything else is
/// answered with exactly one reply to the sender.
fn check_say(world: &mut World, client: u8) -> Result<(), TestCaseError> {
    let Some(session) = world.live(client) else { return Ok(()) };
    let Some(member) = world.server.registry().member(session).cloned() else {
        return Ok(());
    };
    if member.pending_request_from().is_some() {
        // The line is an answer, not chat.
        return Ok(());
    }

    let text = format!("message from {}", name(client));
    let partner = world.server.registry().partner_of(session);
    let pair = member.partner().map(|p| PairKey::new(member.identity(), p));
    let lines_before = pair.as_ref().map_or(0, |p| world.server.transcripts().line_count(p));

    world.line(client, &text);
    let delivered = world.drain_all();

    for (to, messages) in &delivered {
        match (partner, member.is_speaker()) {
            (Some(partner), true) if *to == partner => {
                prop_assert_eq!(messages.len(), 1);
                prop_assert!(!messages[0].is_reply());
                let expected_suffix = format!("{}: {}", name(client), text);
                prop_assert!(messages[0].text().ends_with(&expected_suffix));
            },
            (None, _) | (Some(_), false) if *to == session => {
                prop_assert_eq!(messages.len(), 1);
                prop_assert!(messages[0].is_reply());
            },
            _ => prop_assert!(messages.is_empty(), "{} unexpectedly got {:?}", to, messages),
        }
    }

    if let (Some(pair), true) = (pair, member.is_speaker()) {
        prop_assert_eq!(world.server.transcripts().line_count(&pair), lines_before + 1);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn random_operations_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..120)) {
        run(&ops)?;
    }
}

#[test]
fn long_fixed_sequence() {
    let ops: Vec<Op> = (0..CLIENTS)
        .map(Op::Login)
        .chain([
            Op::Connect(0, 1),
            Op::Connect(2, 1),
            Op::Answer(1, true),
            Op::Say(0),
            Op::Vote(0),
            Op::Say(1),
            Op::Connect(3, 0),
            Op::Login(0),
            Op::Say(1),
            Op::Connect(1, 3),
            Op::Answer(3, true),
            Op::Drop(1),
            Op::Exit(3),
        ])
        .collect();
    run(&ops).unwrap();
}
