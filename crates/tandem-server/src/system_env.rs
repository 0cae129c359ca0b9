//! Production Environment implementation using the local clock and OS RNG.
//!
//! Timestamps on relayed chat lines come from the local wall clock; login codes
//! come from getrandom. Neither is reproducible, which is why tests use the
//! harness environment instead.

use chrono::NaiveDateTime;
use tandem_core::Environment;

/// Production environment using the local wall clock and cryptographic RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. Login codes drawn from a broken
/// RNG would be guessable, so refusing to continue is the only safe outcome.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn local_time(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - login codes would be predictable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn timestamp_has_minute_precision() {
        let stamp = SystemEnv::new().timestamp();
        // YYYY-MM-DD HH:MM
        assert_eq!(stamp.len(), 16);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
        assert_eq!(&stamp[13..14], ":");
    }
}
