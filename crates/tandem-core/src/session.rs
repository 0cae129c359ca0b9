//! Per-connection session state.
//!
//! A [`Session`] exists for every live connection. Its [`SessionState`] makes
//! the lifecycle explicit: the claimed identity only exists while a code is
//! outstanding, and conversation fields only exist once authenticated, so the
//! "pending-auth entry" and "pairing state" of a session can never disagree
//! with its lifecycle.

use std::fmt;

use crate::error::SessionError;

/// Opaque connection handle.
///
/// An arena slot index tagged with the slot's generation. When a connection
/// closes its slot may be reused, but with a bumped generation, so a stale id
/// from the old connection never resolves to the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    index: u32,
    generation: u32,
}

impl SessionId {
    /// Build an id from its parts. Only the registry should mint these.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at allocation time.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// Lifecycle phase, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for a claimed identity
    Connecting,
    /// Code delivered, waiting for it to be entered
    AwaitingCode,
    /// Identity proven
    Authenticated,
}

/// Lifecycle phase with the data that only exists in that phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a claimed identity
    Connecting,
    /// Code delivered to `claimed`; the next line is the code
    AwaitingCode {
        /// Identity being verified
        claimed: String,
    },
    /// Identity proven
    Authenticated(Member),
}

/// A `/connect` waiting for its target's yes/no.
///
/// Carries the requester's connection as well as its identity: the identity
/// alone cannot tell the asking connection from a later login under the same
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Requester's identity at the time of asking
    pub identity: String,
    /// Connection that asked
    pub session: SessionId,
}

/// Conversation state of an authenticated session.
///
/// `speaking` is meaningful only while `partner` is set. The registry keeps
/// the pair-wide invariants (symmetry, exactly one speaker); this type only
/// guarantees the local ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    identity: String,
    partner: Option<String>,
    speaking: bool,
    pending_request: Option<PendingRequest>,
}

impl Member {
    /// Fresh, idle member.
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), partner: None, speaking: false, pending_request: None }
    }

    /// Authenticated identity. Immutable for the life of the session.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Identity of the conversation partner, if paired.
    pub fn partner(&self) -> Option<&str> {
        self.partner.as_deref()
    }

    /// Whether paired.
    pub fn is_paired(&self) -> bool {
        self.partner.is_some()
    }

    /// Whether this side currently holds the turn. Always false when unpaired.
    pub fn is_speaker(&self) -> bool {
        self.speaking
    }

    /// Identity of a client waiting for this one to answer yes/no.
    pub fn pending_request_from(&self) -> Option<&str> {
        self.pending_request.as_ref().map(|request| request.identity.as_str())
    }

    /// The request waiting on this member, if any.
    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending_request.as_ref()
    }

    /// Enter a conversation.
    pub fn pair_with(&mut self, partner: &str, speaking: bool) {
        debug_assert!(self.pending_request.is_none(), "paired member with pending request");
        self.partner = Some(partner.to_string());
        self.speaking = speaking;
    }

    /// Leave the conversation. Returns the former partner.
    pub fn clear_partner(&mut self) -> Option<String> {
        self.speaking = false;
        self.partner.take()
    }

    /// Give or take the turn.
    pub fn set_speaking(&mut self, speaking: bool) {
        debug_assert!(self.partner.is_some() || !speaking, "unpaired member cannot speak");
        self.speaking = speaking;
    }

    /// Record an incoming request.
    pub fn set_pending_request(&mut self, requester: &str, session: SessionId) {
        debug_assert!(self.partner.is_none(), "pending request on paired member");
        self.pending_request = Some(PendingRequest { identity: requester.to_string(), session });
    }

    /// Consume the incoming request, if any.
    pub fn take_pending_request(&mut self) -> Option<PendingRequest> {
        self.pending_request.take()
    }
}

/// Server-side state for one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    /// New session in [`SessionState::Connecting`].
    pub fn new(id: SessionId) -> Self {
        Self { id, state: SessionState::Connecting }
    }

    /// Connection handle.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Full state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Lifecycle phase.
    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            SessionState::Connecting => Lifecycle::Connecting,
            SessionState::AwaitingCode { .. } => Lifecycle::AwaitingCode,
            SessionState::Authenticated(_) => Lifecycle::Authenticated,
        }
    }

    /// Authenticated identity. `None` before login.
    pub fn identity(&self) -> Option<&str> {
        self.member().map(Member::identity)
    }

    /// Identity awaiting code verification. `None` outside `AwaitingCode`.
    pub fn pending_identity(&self) -> Option<&str> {
        match &self.state {
            SessionState::AwaitingCode { claimed } => Some(claimed),
            _ => None,
        }
    }

    /// Conversation state. `None` before login.
    pub fn member(&self) -> Option<&Member> {
        match &self.state {
            SessionState::Authenticated(member) => Some(member),
            _ => None,
        }
    }

    /// Mutable conversation state. `None` before login.
    pub fn member_mut(&mut self) -> Option<&mut Member> {
        match &mut self.state {
            SessionState::Authenticated(member) => Some(member),
            _ => None,
        }
    }

    /// `Connecting → AwaitingCode` after the code was delivered to `claimed`.
    pub fn await_code(&mut self, claimed: &str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::AwaitingCode { claimed: claimed.to_string() };
                Ok(())
            },
            _ => Err(SessionError::InvalidState { state: self.lifecycle(), operation: "await_code" }),
        }
    }

    /// `AwaitingCode → Authenticated` after the code matched. Returns the
    /// now-bound identity.
    pub fn authenticate(&mut self) -> Result<&str, SessionError> {
        let lifecycle = self.lifecycle();
        let claimed = match &mut self.state {
            SessionState::AwaitingCode { claimed } => std::mem::take(claimed),
            _ => {
                return Err(SessionError::InvalidState { state: lifecycle, operation: "authenticate" });
            },
        };

        self.state = SessionState::Authenticated(Member::new(claimed));
        Ok(self.identity().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionId::new(3, 1))
    }

    #[test]
    fn new_session_is_connecting() {
        let s = session();
        assert_eq!(s.lifecycle(), Lifecycle::Connecting);
        assert!(s.identity().is_none());
        assert!(s.pending_identity().is_none());
    }

    #[test]
    fn full_login_path() {
        let mut s = session();
        s.await_code("alice").unwrap();
        assert_eq!(s.lifecycle(), Lifecycle::AwaitingCode);
        assert_eq!(s.pending_identity(), Some("alice"));
        assert!(s.identity().is_none());

        assert_eq!(s.authenticate().unwrap(), "alice");
        assert_eq!(s.lifecycle(), Lifecycle::Authenticated);
        assert_eq!(s.identity(), Some("alice"));
        assert!(s.pending_identity().is_none());

        let member = s.member().unwrap();
        assert!(!member.is_paired());
        assert!(!member.is_speaker());
        assert!(member.pending_request_from().is_none());
    }

    #[test]
    fn cannot_authenticate_without_code() {
        let mut s = session();
        assert_eq!(
            s.authenticate(),
            Err(SessionError::InvalidState {
                state: Lifecycle::Connecting,
                operation: "authenticate"
            })
        );
    }

    #[test]
    fn cannot_reclaim_identity_after_login() {
        let mut s = session();
        s.await_code("alice").unwrap();
        s.authenticate().unwrap();

        assert!(s.await_code("mallory").is_err());
        assert_eq!(s.identity(), Some("alice"));
    }

    #[test]
    fn clearing_partner_drops_turn() {
        let mut m = Member::new("alice");
        m.pair_with("bob", true);
        assert_eq!(m.partner(), Some("bob"));
        assert!(m.is_speaker());

        assert_eq!(m.clear_partner(), Some("bob".to_string()));
        assert!(!m.is_paired());
        assert!(!m.is_speaker());
        assert_eq!(m.clear_partner(), None);
    }

    #[test]
    fn pending_request_is_one_shot() {
        let mut m = Member::new("bob");
        let asker = SessionId::new(4, 2);
        m.set_pending_request("alice", asker);
        assert_eq!(m.pending_request_from(), Some("alice"));
        assert_eq!(m.pending_request().map(|r| r.session), Some(asker));
        assert_eq!(
            m.take_pending_request(),
            Some(PendingRequest { identity: "alice".to_string(), session: asker })
        );
        assert_eq!(m.take_pending_request(), None);
    }

    #[test]
    fn session_id_display_and_order() {
        let a = SessionId::new(1, 0);
        let b = SessionId::new(1, 1);
        let c = SessionId::new(2, 0);
        assert_eq!(a.to_string(), "1.0");
        assert!(a < b && b < c);
    }
}
