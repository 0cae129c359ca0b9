//! Redb-backed transcript store.
//!
//! Single table keyed by the encoded pair. Each append is a read-modify-write
//! inside one write transaction, so a crash never leaves half a line behind.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use tandem_core::PairKey;

use super::{StorageError, TranscriptStore};

/// Table: transcripts
/// Key: `<len(low)>:<low><high>`
/// Value: full transcript text
const TRANSCRIPTS: TableDefinition<&str, &str> = TableDefinition::new("transcripts");

/// Durable transcript store backed by Redb. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbTranscripts {
    db: Arc<Database>,
}

impl RedbTranscripts {
    /// Open or create the database at `path` and make sure the table exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(TRANSCRIPTS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

/// Length prefix keeps the encoding injective for any identity bytes.
fn encode_key(pair: &PairKey) -> String {
    format!("{}:{}{}", pair.low().len(), pair.low(), pair.high())
}

impl TranscriptStore for RedbTranscripts {
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError> {
        let key = encode_key(pair);
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(TRANSCRIPTS).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut transcript = table
                .get(key.as_str())
                .map_err(|e| StorageError::Io(e.to_string()))?
                .map(|guard| guard.value().to_string())
                .unwrap_or_default();
            transcript.push_str(text);

            table
                .insert(key.as_str(), transcript.as_str())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn load(&self, pair: &PairKey) -> Result<String, StorageError> {
        let key = encode_key(pair);
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(TRANSCRIPTS).map_err(|e| StorageError::Io(e.to_string()))?;

        let transcript = table
            .get(key.as_str())
            .map_err(|e| StorageError::Io(e.to_string()))?
            .map(|guard| guard.value().to_string())
            .unwrap_or_default();

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_is_injective() {
        let a = encode_key(&PairKey::new("ab", "c"));
        let b = encode_key(&PairKey::new("a", "bc"));
        assert_ne!(a, b);
        assert_eq!(a, "2:abc");
        assert_eq!(b, "1:abc");
    }
}
