//! Transcript storage.
//!
//! One append-only text blob per unordered identity pair. The trait is
//! synchronous: the driver calls it from inside a single event-handling step
//! and the event loop runs on its own thread, so blocking I/O here never
//! stalls the network tasks.

mod chaotic;
mod error;
mod file;
mod memory;
mod redb;

pub use chaotic::ChaoticTranscripts;
pub use error::StorageError;
pub use file::FileTranscripts;
pub use memory::MemoryTranscripts;
use tandem_core::PairKey;

pub use self::redb::RedbTranscripts;

/// Append-only transcript store keyed by [`PairKey`].
///
/// Because the key is unordered, `load` for (A, B) and (B, A) always returns
/// the same text.
pub trait TranscriptStore: Send + 'static {
    /// Append `text` to the pair's transcript.
    ///
    /// # Invariants
    ///
    /// - Post: a subsequent `load` returns the previous transcript followed by
    ///   `text`, byte for byte
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError>;

    /// Full transcript for the pair. Empty if nothing was ever appended.
    fn load(&self, pair: &PairKey) -> Result<String, StorageError>;
}

impl<T: TranscriptStore + ?Sized> TranscriptStore for Box<T> {
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError> {
        (**self).append(pair, text)
    }

    fn load(&self, pair: &PairKey) -> Result<String, StorageError> {
        (**self).load(pair)
    }
}
