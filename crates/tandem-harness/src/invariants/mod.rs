//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold in every reachable state of the
//! session registry, whatever order clients connect, pair, pass the turn and
//! vanish in. Unlike example-based tests they say WHAT must be true, not what
//! one scenario produces.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = RegistrySnapshot::from_registry(driver.registry());
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{IdentityIndex, PairingSymmetry, PendingExclusive, SingleSpeaker};
pub use snapshot::{RegistrySnapshot, SessionSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what was observed.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant failed.
    pub invariant: &'static str,
    /// Offending state, human readable.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of the registry that every reachable state satisfies.
pub trait Invariant: Send + Sync {
    /// Stable name used in violation reports.
    fn name(&self) -> &'static str;

    /// Evaluate against `state`.
    fn check(&self, state: &RegistrySnapshot) -> InvariantResult;
}

/// Set of invariants evaluated together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the pairing invariants.
    ///
    /// Includes:
    /// - [`PairingSymmetry`]: partners point at each other
    /// - [`SingleSpeaker`]: one speaker per pair
    /// - [`IdentityIndex`]: index matches authenticated sessions
    /// - [`PendingExclusive`]: answering a request excludes being paired
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(PairingSymmetry);
        registry.add(SingleSpeaker);
        registry.add(IdentityIndex);
        registry.add(PendingExclusive);
        registry
    }

    /// Register one more invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Evaluate every invariant. Collects all violations rather than
    /// stopping at the first.
    pub fn check_all(&self, state: &RegistrySnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &RegistrySnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Registered invariant count.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
