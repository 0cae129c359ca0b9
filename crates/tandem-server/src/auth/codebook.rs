use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

/// Latest issued code per identity.
///
/// Shared by every authenticator: delivery channels differ, bookkeeping does
/// not. Issuing replaces the previous code; a successful verification or a
/// revocation consumes it. Only identities with a code outstanding take up
/// space.
#[derive(Debug, Default)]
pub struct CodeBook {
    codes: Mutex<HashMap<String, String>>,
}

impl CodeBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code` as the current code for `identity`.
    pub fn issue(&self, identity: &str, code: &str) {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), code.to_string());
    }

    /// Check and consume.
    pub fn verify(&self, identity: &str, code: &str) -> bool {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        match codes.get(identity) {
            Some(expected) if expected == code => {
                codes.remove(identity);
                true
            },
            _ => false,
        }
    }

    /// Drop the outstanding code for `identity`, if any.
    pub fn revoke(&self, identity: &str) {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner).remove(identity);
    }

    /// Number of identities with a code outstanding.
    pub fn len(&self) -> usize {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no code is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a code is outstanding for `identity`.
    pub fn has_code(&self, identity: &str) -> bool {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner).contains_key(identity)
    }
}
