//! One-time login codes.

use std::fmt;

use crate::env::Environment;

/// Number of decimal digits in a login code.
pub const CODE_DIGITS: u32 = 6;

/// A short numeric code delivered out of band to prove ownership of an
/// identity.
#[derive(Clone, PartialEq, Eq)]
pub struct OneTimeCode(String);

impl OneTimeCode {
    /// Draw a fresh code from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let modulus = 10u64.pow(CODE_DIGITS);
        let value = env.random_u64() % modulus;
        Self(format!("{value:0width$}", width = CODE_DIGITS as usize))
    }

    /// Code digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of debug logs.
impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OneTimeCode(******)")
    }
}
