//! Turn passing and leaving a conversation.

use tandem_core::SessionId;
use tandem_proto::replies;

use crate::{driver::ServerAction, registry::SessionRegistry};

/// `/vote`: the speaker hands the turn to the partner.
pub(crate) fn pass_turn(registry: &mut SessionRegistry, session: SessionId) -> Vec<ServerAction> {
    match registry.pass_turn(session) {
        Ok(partner) => vec![
            ServerAction::send(session, replies::passed_turn()),
            ServerAction::send(partner, replies::now_speaking()),
        ],
        Err(rejection) => vec![ServerAction::send(session, rejection.reply())],
    }
}

/// `/end`: leave the conversation. Idempotent; an unpaired session just gets
/// the confirmation.
pub(crate) fn end_conversation(
    registry: &mut SessionRegistry,
    session: SessionId,
) -> Vec<ServerAction> {
    let mut actions = Vec::with_capacity(2);
    if let Some(partner) = registry.unpair(session) {
        actions.push(ServerAction::send(partner, replies::partner_ended()));
    }
    actions.push(ServerAction::send(session, replies::left_conversation()));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paired() -> (SessionRegistry, SessionId, SessionId) {
        let mut registry = SessionRegistry::new();
        let mut login = |identity: &str| {
            let id = registry.open();
            registry.get_mut(id).unwrap().await_code(identity).unwrap();
            registry.authenticate(id).unwrap();
            id
        };
        let alice = login("alice");
        let bob = login("bob");
        registry.pair(alice, bob);
        (registry, alice, bob)
    }

    #[test]
    fn vote_twice_returns_turn() {
        let (mut registry, alice, bob) = paired();

        let actions = pass_turn(&mut registry, alice);
        assert_eq!(actions.len(), 2);
        assert!(registry.member(bob).unwrap().is_speaker());

        pass_turn(&mut registry, bob);
        assert!(registry.member(alice).unwrap().is_speaker());
        assert!(!registry.member(bob).unwrap().is_speaker());
    }

    #[test]
    fn listener_cannot_vote() {
        let (mut registry, alice, bob) = paired();
        let actions = pass_turn(&mut registry, bob);
        assert!(matches!(
            &actions[..],
            [ServerAction::Send { session, message }]
                if *session == bob && *message == replies::not_speaker()
        ));
        assert!(registry.member(alice).unwrap().is_speaker());
    }

    #[test]
    fn end_notifies_partner_once() {
        let (mut registry, alice, bob) = paired();

        let actions = end_conversation(&mut registry, bob);
        assert_eq!(actions.len(), 2);
        assert!(!registry.member(alice).unwrap().is_paired());

        let actions = end_conversation(&mut registry, bob);
        assert!(matches!(
            &actions[..],
            [ServerAction::Send { session, message }]
                if *session == bob && *message == replies::left_conversation()
        ));
    }
}
