//! Tandem protocol core.
//!
//! Pure domain types shared by the server and its test harness. Nothing in
//! this crate performs I/O; time and randomness come in through
//! [`env::Environment`] so the same logic runs under real clocks in
//! production and seeded simulation in tests.
//!
//! # Session lifecycle
//!
//! ```text
//! ┌────────────┐  identity   ┌──────────────┐   code ok   ┌───────────────┐
//! │ Connecting │────────────>│ AwaitingCode │────────────>│ Authenticated │
//! └────────────┘             └──────────────┘             └───────────────┘
//!       ^   │ empty / delivery failed  │ wrong code               │
//!       └───┘                          └──(stays)                 │ pairing
//!                                                                 v
//!                                      idle ─ request ─> pending ─ yes ─> paired
//!                                                                  (speaker | listener)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod code;
pub mod env;
pub mod error;
pub mod pair;
pub mod session;

pub use code::OneTimeCode;
pub use env::Environment;
pub use error::{Rejection, SessionError};
pub use pair::PairKey;
pub use session::{Lifecycle, Member, PendingRequest, Session, SessionId, SessionState};
