//! Observable registry state for invariant checking.
//!
//! Invariants run against a snapshot rather than the live registry so one
//! check sees one consistent state.

use tandem_core::{Lifecycle, Session, SessionId};
use tandem_server::SessionRegistry;

/// Snapshot of every live session plus the identity index.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Live sessions, in slot order.
    pub sessions: Vec<SessionSnapshot>,
    /// Identity index entries.
    pub identities: Vec<(String, SessionId)>,
}

impl RegistrySnapshot {
    /// Create an empty snapshot (no sessions).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of `registry`.
    pub fn from_registry(registry: &SessionRegistry) -> Self {
        let sessions = registry.iter().map(SessionSnapshot::from_session).collect();
        let mut identities: Vec<_> =
            registry.identities().map(|(identity, id)| (identity.to_string(), id)).collect();
        identities.sort();
        Self { sessions, identities }
    }

    /// Add a session snapshot.
    pub fn add_session(&mut self, session: SessionSnapshot) {
        self.sessions.push(session);
    }

    /// Add an identity index entry.
    pub fn add_identity(&mut self, identity: &str, id: SessionId) {
        self.identities.push((identity.to_string(), id));
    }

    /// Session with `id`, if live.
    pub fn session(&self, id: SessionId) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Session the index maps `identity` to.
    pub fn session_for(&self, identity: &str) -> Option<&SessionSnapshot> {
        let id = self.identities.iter().find(|(name, _)| name == identity).map(|(_, id)| *id)?;
        self.session(id)
    }
}

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session handle.
    pub id: SessionId,
    /// Lifecycle phase.
    pub lifecycle: Lifecycle,
    /// Authenticated identity.
    pub identity: Option<String>,
    /// Partner identity while paired.
    pub partner: Option<String>,
    /// Holds the turn. Only meaningful while paired.
    pub speaking: bool,
    /// Requester whose pairing request awaits an answer.
    pub pending_from: Option<String>,
}

impl SessionSnapshot {
    /// Unauthenticated session in the `Connecting` phase.
    pub fn connecting(id: SessionId) -> Self {
        Self {
            id,
            lifecycle: Lifecycle::Connecting,
            identity: None,
            partner: None,
            speaking: false,
            pending_from: None,
        }
    }

    /// Authenticated, idle session.
    pub fn authenticated(id: SessionId, identity: &str) -> Self {
        Self {
            lifecycle: Lifecycle::Authenticated,
            identity: Some(identity.to_string()),
            ..Self::connecting(id)
        }
    }

    /// Set the partner and turn.
    pub fn with_partner(mut self, partner: &str, speaking: bool) -> Self {
        self.partner = Some(partner.to_string());
        self.speaking = speaking;
        self
    }

    /// Set the pending requester.
    pub fn with_pending(mut self, requester: &str) -> Self {
        self.pending_from = Some(requester.to_string());
        self
    }

    fn from_session(session: &Session) -> Self {
        let member = session.member();
        Self {
            id: session.id(),
            lifecycle: session.lifecycle(),
            identity: session.identity().map(str::to_string),
            partner: member.and_then(|m| m.partner()).map(str::to_string),
            speaking: member.is_some_and(|m| m.is_speaker()),
            pending_from: member.and_then(|m| m.pending_request_from()).map(str::to_string),
        }
    }
}
