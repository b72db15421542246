use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::{frame, Registry, SnapshotError};

/// A snapshot file read from disk and expanded to its raw bytes.
///
/// [`open`](SnapshotReader::open) reads the whole file and decompresses it in
/// one step; nothing about the live registry is touched until
/// [`into_registry`](SnapshotReader::into_registry) has fully decoded it.
pub struct SnapshotReader {
    path: PathBuf,
    snapshot: Vec<u8>,
}

impl SnapshotReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let started = Instant::now();
        let framed = fs::read(&path)?;
        let snapshot = frame::decompress(&framed)?;
        info!(
            path = %path.display(),
            compressed = framed.len(),
            raw = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot read"
        );
        Ok(Self { path, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The unframed snapshot.
    pub fn bytes(&self) -> &[u8] {
        &self.snapshot
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.snapshot
    }

    /// Decodes the snapshot into a registry with tree order `order`.
    pub fn into_registry(self, order: usize) -> Result<Registry, SnapshotError> {
        Registry::decode(&self.snapshot, order)
    }
}
