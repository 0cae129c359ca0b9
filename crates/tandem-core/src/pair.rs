//! Unordered identity pairs.

use std::fmt;

/// Key for anything stored per conversation pair.
///
/// The two identities are kept in sorted order, so `PairKey::new(a, b)` and
/// `PairKey::new(b, a)` are equal. Transcript storage relies on this to make
/// history independent of who initiated the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    /// Build the key for two identities, in any order.
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self { low: low.to_string(), high: high.to_string() }
    }

    /// Lexicographically smaller identity.
    pub fn low(&self) -> &str {
        &self.low
    }

    /// Lexicographically larger identity.
    pub fn high(&self) -> &str {
        &self.high
    }

    /// Whether `identity` is one side of this pair.
    pub fn contains(&self, identity: &str) -> bool {
        self.low == identity || self.high == identity
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}
