//! One text file per pair under a history directory.
//!
//! Files are named `history_<low>_<high>.txt`. Identity bytes outside
//! `[A-Za-z0-9-]` are written as `%XX`, so two distinct pairs never share a
//! file and an identity can never escape the directory.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tandem_core::PairKey;

use super::{StorageError, TranscriptStore};

/// Directory-backed transcript store. The directory is created on first
/// append.
#[derive(Debug, Clone)]
pub struct FileTranscripts {
    dir: PathBuf,
}

impl FileTranscripts {
    /// Store transcripts under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the pair's transcript.
    pub fn path_for(&self, pair: &PairKey) -> PathBuf {
        self.dir.join(format!("history_{}_{}.txt", escape(pair.low()), escape(pair.high())))
    }
}

fn escape(identity: &str) -> String {
    let mut out = String::with_capacity(identity.len());
    for byte in identity.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

impl TranscriptStore for FileTranscripts {
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(self.path_for(pair))?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    fn load(&self, pair: &PairKey) -> Result<String, StorageError> {
        match fs::read_to_string(self.path_for(pair)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}
