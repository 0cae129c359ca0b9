use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use super::{Authenticator, CodeBook};

/// Authenticator that keeps delivered codes in memory.
///
/// Used by tests and the simulation harness, which read codes back with
/// [`MemoryAuthenticator::last_code`]. With [`MemoryAuthenticator::logging`]
/// it writes each code to the log instead, which makes a local server usable
/// without any external messaging account; the log is then the only record
/// of what was delivered.
#[derive(Clone, Default)]
pub struct MemoryAuthenticator {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    book: CodeBook,
    delivered: Mutex<HashMap<String, Vec<String>>>,
    unreachable: Mutex<HashSet<String>>,
    log_codes: bool,
}

impl MemoryAuthenticator {
    /// Silent in-memory authenticator.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory authenticator that logs every delivered code at WARN and
    /// keeps no delivery record.
    pub fn logging() -> Self {
        Self { inner: Arc::new(Inner { log_codes: true, ..Inner::default() }) }
    }

    /// Make deliveries to `identity` fail, as if the external channel
    /// rejected the recipient.
    pub fn set_unreachable(&self, identity: &str, unreachable: bool) {
        let mut set = self.inner.unreachable.lock().unwrap_or_else(PoisonError::into_inner);
        if unreachable {
            set.insert(identity.to_string());
        } else {
            set.remove(identity);
        }
    }

    /// Most recent code delivered to `identity`.
    pub fn last_code(&self, identity: &str) -> Option<String> {
        self.inner
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .and_then(|codes| codes.last().cloned())
    }

    /// Number of identities holding an unused code.
    pub fn outstanding_codes(&self) -> usize {
        self.inner.book.len()
    }

    /// Number of codes delivered to `identity` so far.
    pub fn delivery_count(&self, identity: &str) -> usize {
        self.inner
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .map_or(0, Vec::len)
    }
}

impl Authenticator for MemoryAuthenticator {
    fn send_code(&self, identity: &str, code: &str) -> bool {
        let unreachable = self
            .inner
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity);
        if unreachable {
            return false;
        }

        self.inner.book.issue(identity, code);
        if self.inner.log_codes {
            tracing::warn!(identity, code, "login code (not delivered externally)");
        } else {
            self.inner
                .delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(identity.to_string())
                .or_default()
                .push(code.to_string());
        }
        true
    }

    fn verify_code(&self, identity: &str, code: &str) -> bool {
        self.inner.book.verify(identity, code)
    }

    fn revoke_code(&self, identity: &str) {
        self.inner.book.revoke(identity);
    }
}
