use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::{frame, SnapshotError};

/// Writes one framed snapshot to disk.
///
/// The frame goes to `<path>.tmp` first, is fsynced, and is then renamed over
/// `path`. A crash or error before the rename leaves any previous file at
/// `path` intact; a stale `.tmp` is simply overwritten by the next save.
pub struct SnapshotWriter {
    path: PathBuf,
    level: i32,
}

/// `<path>.tmp`, keeping the full original file name.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

impl SnapshotWriter {
    pub fn new(path: impl AsRef<Path>, level: i32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            level,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compresses `snapshot` and writes it atomically. Returns the file size.
    pub fn write(&self, snapshot: &[u8]) -> Result<u64, SnapshotError> {
        let started = Instant::now();
        let framed = frame::compress(snapshot, self.level)?;
        debug!(
            raw = snapshot.len(),
            compressed = framed.len(),
            level = self.level,
            "snapshot compressed"
        );

        let tmp = tmp_path(&self.path);
        let result = self.write_tmp(&tmp, &framed).and_then(|()| {
            fs::rename(&tmp, &self.path)?;
            Ok(())
        });
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        info!(
            path = %self.path.display(),
            raw = snapshot.len(),
            compressed = framed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot written"
        );
        Ok(framed.len() as u64)
    }

    fn write_tmp(&self, tmp: &Path, framed: &[u8]) -> Result<(), SnapshotError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp)?;
        file.write_all(framed)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
