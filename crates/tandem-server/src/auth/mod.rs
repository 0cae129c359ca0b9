//! Login code delivery and verification.
//!
//! The driver never sees where a code goes. It generates one, hands it to an
//! [`Authenticator`] for delivery to the claimed identity, and later asks the
//! same authenticator whether an entered code matches.

mod codebook;
mod memory;
mod telegram;

pub use codebook::CodeBook;
pub use memory::MemoryAuthenticator;
pub use telegram::{TelegramAuthenticator, load_bot_token};

/// Out-of-band code delivery and verification.
///
/// Calls may block (an HTTP round trip, for instance). The driver runs on a
/// dedicated thread, so blocking here only delays the event loop.
pub trait Authenticator: Send + 'static {
    /// Deliver `code` to `identity`. Returns false if the external channel
    /// refused or could not be reached. A successful delivery supersedes any
    /// earlier code for the same identity.
    fn send_code(&self, identity: &str, code: &str) -> bool;

    /// Whether `code` is the latest code delivered to `identity`. A matching
    /// code is consumed.
    fn verify_code(&self, identity: &str, code: &str) -> bool;

    /// Forget any outstanding code for `identity`. Called when the last
    /// connection waiting on that code goes away.
    fn revoke_code(&self, identity: &str);
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn send_code(&self, identity: &str, code: &str) -> bool {
        (**self).send_code(identity, code)
    }

    fn verify_code(&self, identity: &str, code: &str) -> bool {
        (**self).verify_code(identity, code)
    }

    fn revoke_code(&self, identity: &str) {
        (**self).revoke_code(identity);
    }
}
