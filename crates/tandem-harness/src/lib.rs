//! Deterministic simulation harness for tandem protocol testing.
//!
//! The server driver is sans-IO, so simulation needs no network at all:
//! [`SimServer`] feeds lines straight into the driver, executes the returned
//! actions against in-memory outboxes, and checks the registry invariants
//! after every event.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks over a [`RegistrySnapshot`]. Use [`InvariantRegistry::standard()`]
//! for the pairing invariants every reachable state must satisfy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    IdentityIndex, Invariant, InvariantRegistry, InvariantResult, PairingSymmetry,
    PendingExclusive, RegistrySnapshot, SessionSnapshot, SingleSpeaker, Violation,
};
pub use sim_env::SimEnv;
pub use sim_server::SimServer;
