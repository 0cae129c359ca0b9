//! Session registry: every live connection and the identity index.
//!
//! Sessions live in a generational arena. A closed slot is reused for a later
//! connection with a bumped generation, so a [`SessionId`] held by a stale
//! event never resolves to the newcomer.
//!
//! The registry also owns the pair-wide invariants that a single [`Member`]
//! cannot see:
//!
//! - Pairing is symmetric: A's partner is B iff B's partner is A
//! - A pair has exactly one speaker
//! - `identities` maps each authenticated identity to its one live session
//!
//! All mutation that could break them goes through the `pub(crate)` methods
//! here; the rest of the crate only reads.

use std::collections::HashMap;

use tandem_core::{Member, PendingRequest, Rejection, Session, SessionId};

use crate::server_error::DriverError;

#[derive(Debug)]
struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// A session removed by [`SessionRegistry::close`].
#[derive(Debug)]
pub struct Closed {
    /// Final state of the removed session
    pub session: Session,
    /// Former partner, already unpaired
    pub partner: Option<SessionId>,
}

/// All live sessions, indexed by id and by authenticated identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    /// Authenticated identity → session. One session per identity.
    identities: HashMap<String, SessionId>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection in `Connecting`.
    pub(crate) fn open(&mut self) -> SessionId {
        let id = match self.free.pop() {
            Some(index) => SessionId::new(index, self.slots[index as usize].generation),
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot { generation: 0, session: None });
                SessionId::new(index, 0)
            },
        };

        self.slots[id.index() as usize].session = Some(Session::new(id));
        self.live += 1;
        id
    }

    /// Live session. `None` if closed or never opened.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.session.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.session.as_mut())
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live sessions in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(|slot| slot.session.as_ref())
    }

    /// Session bound to an authenticated identity.
    pub fn session_for(&self, identity: &str) -> Option<SessionId> {
        self.identities.get(identity).copied()
    }

    /// Identity index entries, in no particular order.
    pub fn identities(&self) -> impl Iterator<Item = (&str, SessionId)> {
        self.identities.iter().map(|(identity, id)| (identity.as_str(), *id))
    }

    /// Conversation state of an authenticated session.
    pub fn member(&self, id: SessionId) -> Option<&Member> {
        self.get(id).and_then(Session::member)
    }

    pub(crate) fn member_mut(&mut self, id: SessionId) -> Option<&mut Member> {
        self.get_mut(id).and_then(Session::member_mut)
    }

    /// Identity awaiting verification on `id`.
    pub fn pending_identity(&self, id: SessionId) -> Option<&str> {
        self.get(id).and_then(Session::pending_identity)
    }

    /// The connection that made `request`, if it is still live.
    ///
    /// `None` once that connection closed, even if the same identity has
    /// since logged in again on another one.
    pub fn requester_of(&self, request: &PendingRequest) -> Option<SessionId> {
        self.member(request.session)
            .filter(|member| member.identity() == request.identity)
            .map(|_| request.session)
    }

    /// Partner's session, resolved through the identity index.
    pub fn partner_of(&self, id: SessionId) -> Option<SessionId> {
        self.member(id).and_then(Member::partner).and_then(|partner| self.session_for(partner))
    }

    /// `AwaitingCode → Authenticated` and bind the identity.
    ///
    /// # Invariants
    ///
    /// - Pre: no other live session holds the identity (the caller evicts it)
    pub(crate) fn authenticate(&mut self, id: SessionId) -> Result<String, DriverError> {
        let session = self.get_mut(id).ok_or(DriverError::SessionNotFound(id))?;
        let identity = session.authenticate()?.to_string();

        let previous = self.identities.insert(identity.clone(), id);
        debug_assert!(
            previous.is_none_or(|previous| previous == id),
            "identity {identity} still bound to {previous:?}"
        );
        Ok(identity)
    }

    /// Commit a pairing. The requester speaks first.
    ///
    /// # Invariants
    ///
    /// - Pre: both sessions authenticated, unpaired, no pending request
    /// - Post: partners point at each other, exactly one speaker
    pub(crate) fn pair(&mut self, requester: SessionId, responder: SessionId) {
        let (Some(requester_identity), Some(responder_identity)) = (
            self.member(requester).map(|m| m.identity().to_string()),
            self.member(responder).map(|m| m.identity().to_string()),
        ) else {
            debug_assert!(false, "pairing unauthenticated sessions {requester} and {responder}");
            return;
        };

        if let Some(member) = self.member_mut(requester) {
            member.pair_with(&responder_identity, true);
        }
        if let Some(member) = self.member_mut(responder) {
            member.pair_with(&requester_identity, false);
        }
    }

    /// Dissolve the pairing `id` is in. Returns the former partner.
    pub(crate) fn unpair(&mut self, id: SessionId) -> Option<SessionId> {
        let partner = self.partner_of(id);
        self.member_mut(id)?.clear_partner()?;
        if let Some(partner) = partner {
            if let Some(member) = self.member_mut(partner) {
                member.clear_partner();
            }
        }
        partner
    }

    /// Hand the turn from `id` to its partner. Returns the partner.
    pub(crate) fn pass_turn(&mut self, id: SessionId) -> Result<SessionId, Rejection> {
        let member = self.member(id).ok_or(Rejection::NotPaired)?;
        if !member.is_paired() {
            return Err(Rejection::NotPaired);
        }
        if !member.is_speaker() {
            return Err(Rejection::NotSpeaker);
        }
        let partner = self.partner_of(id).ok_or(Rejection::NotPaired)?;

        if let Some(member) = self.member_mut(id) {
            member.set_speaking(false);
        }
        if let Some(member) = self.member_mut(partner) {
            member.set_speaking(true);
        }
        Ok(partner)
    }

    /// Remove a session, unpair its partner and release its identity.
    ///
    /// Requests the session had sent to others stay where they are; answering
    /// them later finds the requester gone.
    pub(crate) fn close(&mut self, id: SessionId) -> Option<Closed> {
        let partner = self.unpair(id);

        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?;
        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;

        if let Some(identity) = session.identity() {
            if self.identities.get(identity) == Some(&id) {
                self.identities.remove(identity);
            }
        }

        Some(Closed { session, partner })
    }

    /// Remove every session, in ascending slot order.
    pub(crate) fn drain(&mut self) -> Vec<Session> {
        let ids: Vec<SessionId> = self.iter().map(Session::id).collect();
        ids.into_iter().filter_map(|id| self.close(id)).map(|closed| closed.session).collect()
    }
}

#[cfg(test)]
mod tests {
    use tandem_core::Lifecycle;

    use super::*;

    fn login(registry: &mut SessionRegistry, identity: &str) -> SessionId {
        let id = registry.open();
        registry.get_mut(id).unwrap().await_code(identity).unwrap();
        registry.authenticate(id).unwrap();
        id
    }

    #[test]
    fn open_assigns_distinct_ids() {
        let mut registry = SessionRegistry::new();
        let a = registry.open();
        let b = registry.open();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().lifecycle(), Lifecycle::Connecting);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut registry = SessionRegistry::new();
        let old = registry.open();
        registry.close(old).unwrap();

        let new = registry.open();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(registry.get(old).is_none());
        assert!(registry.contains(new));
        assert!(registry.close(old).is_none());
    }

    #[test]
    fn authenticate_binds_identity() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        assert_eq!(registry.session_for("alice"), Some(alice));
        assert_eq!(registry.get(alice).unwrap().identity(), Some("alice"));
    }

    #[test]
    fn authenticate_requires_pending_code() {
        let mut registry = SessionRegistry::new();
        let id = registry.open();
        assert!(registry.authenticate(id).is_err());
        assert_eq!(registry.identities().count(), 0);
    }

    #[test]
    fn pair_and_unpair_are_symmetric() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        let bob = login(&mut registry, "bob");

        registry.pair(alice, bob);
        assert_eq!(registry.partner_of(alice), Some(bob));
        assert_eq!(registry.partner_of(bob), Some(alice));
        assert!(registry.member(alice).unwrap().is_speaker());
        assert!(!registry.member(bob).unwrap().is_speaker());

        assert_eq!(registry.unpair(bob), Some(alice));
        assert!(!registry.member(alice).unwrap().is_paired());
        assert!(!registry.member(bob).unwrap().is_paired());
        assert_eq!(registry.unpair(bob), None);
    }

    #[test]
    fn pass_turn_flips_speaker() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        let bob = login(&mut registry, "bob");
        registry.pair(alice, bob);

        assert_eq!(registry.pass_turn(bob), Err(Rejection::NotSpeaker));
        assert_eq!(registry.pass_turn(alice), Ok(bob));
        assert!(registry.member(bob).unwrap().is_speaker());
        assert!(!registry.member(alice).unwrap().is_speaker());
    }

    #[test]
    fn pass_turn_unpaired() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        assert_eq!(registry.pass_turn(alice), Err(Rejection::NotPaired));
    }

    #[test]
    fn close_unpairs_and_releases_identity() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        let bob = login(&mut registry, "bob");
        registry.pair(alice, bob);

        let closed = registry.close(alice).unwrap();
        assert_eq!(closed.partner, Some(bob));
        assert_eq!(closed.session.identity(), Some("alice"));
        assert_eq!(registry.session_for("alice"), None);
        assert!(!registry.member(bob).unwrap().is_paired());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closing_unauthenticated_session_keeps_index() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        let pending = registry.open();
        registry.get_mut(pending).unwrap().await_code("alice").unwrap();

        registry.close(pending).unwrap();
        assert_eq!(registry.session_for("alice"), Some(alice));
    }

    #[test]
    fn requester_of_ignores_a_later_login() {
        let mut registry = SessionRegistry::new();
        let alice = login(&mut registry, "alice");
        let request = PendingRequest { identity: "alice".to_string(), session: alice };
        assert_eq!(registry.requester_of(&request), Some(alice));

        registry.close(alice).unwrap();
        let again = login(&mut registry, "alice");
        assert_eq!(again.index(), alice.index());
        assert_eq!(registry.requester_of(&request), None);
    }

    #[test]
    fn drain_empties_in_slot_order() {
        let mut registry = SessionRegistry::new();
        let a = registry.open();
        let b = login(&mut registry, "bob");
        let c = registry.open();

        let drained: Vec<SessionId> = registry.drain().iter().map(Session::id).collect();
        assert_eq!(drained, vec![a, b, c]);
        assert!(registry.is_empty());
        assert_eq!(registry.identities().count(), 0);
    }
}
