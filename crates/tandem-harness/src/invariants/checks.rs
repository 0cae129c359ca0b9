//! Standard invariant checks.

use std::collections::HashSet;

use tandem_core::Lifecycle;

use super::{Invariant, InvariantResult, RegistrySnapshot, Violation};

/// A's partner is B iff B's partner is A.
///
/// A one-sided pairing would let a message be relayed to someone who cannot
/// answer, or leave a session stuck listening forever.
pub struct PairingSymmetry;

impl Invariant for PairingSymmetry {
    fn name(&self) -> &'static str {
        "pairing_symmetry"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        for session in &state.sessions {
            let (Some(identity), Some(partner)) = (&session.identity, &session.partner) else {
                continue;
            };
            let Some(other) = state.session_for(partner) else {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{identity} ({}) is paired with absent {partner}", session.id),
                });
            };
            if other.partner.as_deref() != Some(identity.as_str()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{identity} is paired with {partner}, but {partner} is paired with {:?}",
                        other.partner
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Exactly one side of every pair holds the turn.
pub struct SingleSpeaker;

impl Invariant for SingleSpeaker {
    fn name(&self) -> &'static str {
        "single_speaker"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        for session in &state.sessions {
            let Some(partner) = &session.partner else { continue };
            let Some(other) = state.session_for(partner) else { continue };
            if session.speaking == other.speaking {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{:?} and {partner} both have speaking = {}",
                        session.identity, session.speaking
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The identity index and the authenticated sessions agree one to one.
///
/// Every authenticated session is indexed under its own identity, and every
/// index entry points at a live authenticated session with that identity.
pub struct IdentityIndex;

impl Invariant for IdentityIndex {
    fn name(&self) -> &'static str {
        "identity_index"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for (identity, id) in &state.identities {
            if !seen.insert(identity.as_str()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{identity} is indexed more than once"),
                });
            }
            let Some(session) = state.session(*id) else {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{identity} maps to closed session {id}"),
                });
            };
            if session.lifecycle != Lifecycle::Authenticated
                || session.identity.as_deref() != Some(identity.as_str())
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{identity} maps to {id}, which is {session:?}"),
                });
            }
        }

        for session in &state.sessions {
            if session.lifecycle != Lifecycle::Authenticated {
                continue;
            }
            let indexed = session
                .identity
                .as_deref()
                .is_some_and(|identity| state.identities.contains(&(identity.to_string(), session.id)));
            if !indexed {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("authenticated session {} is not indexed", session.id),
                });
            }
        }
        Ok(())
    }
}

/// A session answering a request is not in a conversation, and never holds a
/// request from itself.
pub struct PendingExclusive;

impl Invariant for PendingExclusive {
    fn name(&self) -> &'static str {
        "pending_exclusive"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        for session in &state.sessions {
            let Some(requester) = &session.pending_from else { continue };
            if session.partner.is_some() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{:?} holds a request from {requester} while paired with {:?}",
                        session.identity, session.partner
                    ),
                });
            }
            if session.identity.as_ref() == Some(requester) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{requester} holds a request from itself"),
                });
            }
        }
        Ok(())
    }
}
