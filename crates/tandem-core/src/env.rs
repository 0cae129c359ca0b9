//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Production uses the OS clock and RNG; the test harness substitutes a
//! virtual clock and a seeded RNG.

use chrono::NaiveDateTime;

/// Abstract environment providing wall-clock time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current local wall-clock time.
    ///
    /// Used only for human-readable timestamps on relayed messages, so it may
    /// jump (DST, NTP) without affecting protocol state.
    fn local_time(&self) -> NaiveDateTime;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Local time formatted for chat lines (`YYYY-MM-DD HH:MM`).
    fn timestamp(&self) -> String {
        self.local_time().format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn local_time(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 3, 9)
                .and_then(|d| d.and_hms_opt(7, 5, 59))
                .unwrap_or_default()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0xAB);
        }
    }

    #[test]
    fn timestamp_uses_minute_precision() {
        assert_eq!(FixedEnv.timestamp(), "2024-03-09 07:05");
    }

    #[test]
    fn random_u64_is_big_endian_of_bytes() {
        assert_eq!(FixedEnv.random_u64(), 0xABAB_ABAB_ABAB_ABAB);
    }
}
