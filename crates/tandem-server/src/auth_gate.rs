//! Login: identity claim and one-time code check.
//!
//! A session proves its identity in two lines. The first names the identity
//! and triggers delivery of a fresh code to it; the second must be that code.
//! Completing the login (evicting an older session with the same identity,
//! binding the identity) is the driver's job, since eviction is a disconnect.

use tandem_core::{Environment, OneTimeCode, SessionId};
use tandem_proto::replies;

use crate::{
    auth::Authenticator,
    driver::{LogLevel, ServerAction},
    registry::SessionRegistry,
};

/// Result of checking an entered code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CodeCheck {
    /// Code matched; the identity may be bound.
    Verified(String),
    /// Wrong code. The session keeps waiting for the right one.
    Mismatch,
    /// The session has no identity awaiting verification.
    NotPending,
}

/// Wraps the [`Authenticator`] with the session-side login steps.
pub struct AuthGate<A> {
    authenticator: A,
}

impl<A: Authenticator> AuthGate<A> {
    /// Gate delivering codes through `authenticator`.
    pub fn new(authenticator: A) -> Self {
        Self { authenticator }
    }

    /// Delivery backend.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Handle the identity line of a `Connecting` session.
    ///
    /// On successful delivery the session moves to `AwaitingCode`; otherwise
    /// it stays in `Connecting` and is asked again.
    pub(crate) fn claim_identity<E: Environment>(
        &self,
        registry: &mut SessionRegistry,
        env: &E,
        session: SessionId,
        line: &str,
    ) -> Vec<ServerAction> {
        let identity = line.trim();
        if identity.is_empty() {
            return vec![ServerAction::send(session, replies::empty_identity())];
        }

        let code = OneTimeCode::generate(env);
        if !self.authenticator.send_code(identity, code.as_str()) {
            return vec![
                ServerAction::send(session, replies::delivery_failed()),
                ServerAction::log(
                    LogLevel::Warn,
                    format!("session {session}: code delivery to {identity} failed"),
                ),
            ];
        }

        let Some(state) = registry.get_mut(session) else {
            return Vec::new();
        };
        if let Err(e) = state.await_code(identity) {
            return vec![ServerAction::log(LogLevel::Error, format!("session {session}: {e}"))];
        }

        vec![
            ServerAction::send(session, replies::code_sent()),
            ServerAction::log(LogLevel::Info, format!("session {session}: code sent to {identity}")),
        ]
    }

    /// A connection that was waiting on a code for `claimed` closed. The code
    /// is dropped unless another live connection is waiting on it too.
    pub(crate) fn abandon(&self, registry: &SessionRegistry, claimed: &str) {
        if registry.iter().all(|session| session.pending_identity() != Some(claimed)) {
            self.authenticator.revoke_code(claimed);
        }
    }

    /// Check the code line of an `AwaitingCode` session.
    pub(crate) fn submit_code(
        &self,
        registry: &SessionRegistry,
        session: SessionId,
        line: &str,
    ) -> CodeCheck {
        let Some(claimed) = registry.pending_identity(session) else {
            return CodeCheck::NotPending;
        };

        if self.authenticator.verify_code(claimed, line.trim()) {
            CodeCheck::Verified(claimed.to_string())
        } else {
            CodeCheck::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use tandem_core::Lifecycle;
    use tandem_proto::Outbound;

    use super::*;
    use crate::auth::MemoryAuthenticator;

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn local_time(&self) -> NaiveDateTime {
            NaiveDateTime::default()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(7);
        }
    }

    fn sent(actions: &[ServerAction]) -> Vec<&Outbound> {
        actions
            .iter()
            .filter_map(|a| match a {
                ServerAction::Send { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn claim_moves_to_awaiting_code() {
        let gate = AuthGate::new(MemoryAuthenticator::new());
        let mut registry = SessionRegistry::new();
        let id = registry.open();

        let actions = gate.claim_identity(&mut registry, &FixedEnv, id, "  alice \r");
        assert_eq!(sent(&actions), vec![&replies::code_sent()]);
        assert_eq!(registry.get(id).unwrap().lifecycle(), Lifecycle::AwaitingCode);
        assert_eq!(registry.pending_identity(id), Some("alice"));
        assert_eq!(gate.authenticator().delivery_count("alice"), 1);
    }

    #[test]
    fn empty_claim_is_retried() {
        let gate = AuthGate::new(MemoryAuthenticator::new());
        let mut registry = SessionRegistry::new();
        let id = registry.open();

        let actions = gate.claim_identity(&mut registry, &FixedEnv, id, "   ");
        assert_eq!(sent(&actions), vec![&replies::empty_identity()]);
        assert_eq!(registry.get(id).unwrap().lifecycle(), Lifecycle::Connecting);
    }

    #[test]
    fn failed_delivery_stays_connecting() {
        let auth = MemoryAuthenticator::new();
        auth.set_unreachable("ghost", true);
        let gate = AuthGate::new(auth);
        let mut registry = SessionRegistry::new();
        let id = registry.open();

        let actions = gate.claim_identity(&mut registry, &FixedEnv, id, "ghost");
        assert_eq!(sent(&actions), vec![&replies::delivery_failed()]);
        assert_eq!(registry.get(id).unwrap().lifecycle(), Lifecycle::Connecting);
    }

    #[test]
    fn code_check() {
        let gate = AuthGate::new(MemoryAuthenticator::new());
        let mut registry = SessionRegistry::new();
        let id = registry.open();
        assert_eq!(gate.submit_code(&registry, id, "123456"), CodeCheck::NotPending);

        gate.claim_identity(&mut registry, &FixedEnv, id, "alice");
        let code = gate.authenticator().last_code("alice").unwrap();

        assert_eq!(gate.submit_code(&registry, id, "nope"), CodeCheck::Mismatch);
        assert_eq!(
            gate.submit_code(&registry, id, &format!(" {code} ")),
            CodeCheck::Verified("alice".to_string())
        );
    }

    #[test]
    fn abandoned_code_is_revoked_once_nobody_waits() {
        let gate = AuthGate::new(MemoryAuthenticator::new());
        let mut registry = SessionRegistry::new();
        let first = registry.open();
        let second = registry.open();
        gate.claim_identity(&mut registry, &FixedEnv, first, "alice");
        gate.claim_identity(&mut registry, &FixedEnv, second, "alice");

        registry.close(first);
        gate.abandon(&registry, "alice");
        assert_eq!(gate.authenticator().outstanding_codes(), 1);

        registry.close(second);
        gate.abandon(&registry, "alice");
        assert_eq!(gate.authenticator().outstanding_codes(), 0);
    }
}
