use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tandem_core::PairKey;

use super::{StorageError, TranscriptStore};

/// In-memory transcript store for testing and simulation.
///
/// Clones share the same underlying map, so a test can keep a handle while
/// the driver owns another.
#[derive(Clone, Default)]
pub struct MemoryTranscripts {
    inner: Arc<Mutex<HashMap<PairKey, String>>>,
}

impl MemoryTranscripts {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pairs with a transcript.
    pub fn pair_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of lines stored for a pair.
    pub fn line_count(&self, pair: &PairKey) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pair)
            .map_or(0, |text| text.lines().count())
    }
}

impl TranscriptStore for MemoryTranscripts {
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entry(pair.clone()).or_default().push_str(text);
        Ok(())
    }

    fn load(&self, pair: &PairKey) -> Result<String, StorageError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.get(pair).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_transcript_is_empty() {
        let store = MemoryTranscripts::new();
        assert_eq!(store.load(&PairKey::new("a", "b")).unwrap(), "");
        assert_eq!(store.pair_count(), 0);
    }

    #[test]
    fn append_then_load_either_order() {
        let store = MemoryTranscripts::new();
        store.append(&PairKey::new("alice", "bob"), "one\n").unwrap();
        store.append(&PairKey::new("bob", "alice"), "two\n").unwrap();

        assert_eq!(store.load(&PairKey::new("alice", "bob")).unwrap(), "one\ntwo\n");
        assert_eq!(store.load(&PairKey::new("bob", "alice")).unwrap(), "one\ntwo\n");
        assert_eq!(store.line_count(&PairKey::new("alice", "bob")), 2);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryTranscripts::new();
        let handle = store.clone();
        store.append(&PairKey::new("a", "b"), "x\n").unwrap();
        assert_eq!(handle.pair_count(), 1);
    }
}
