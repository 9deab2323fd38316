//! Append-only checkpoint log

use ferry_errors::{Error, StorageError};
use ferry_types::CrateId;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self as tokio_fs, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Read-only view of the keys completed before this run started
pub type Snapshot = Arc<HashSet<String>>;

/// Durable set of completed crate versions
///
/// Owned by exactly one writer for the duration of a run.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    file: File,
    keys: HashSet<String>,
    loaded: usize,
    discarded_partial: bool,
}

impl CheckpointStore {
    /// Open (creating if needed) the checkpoint at `path` and load its keys
    ///
    /// A trailing line without a newline is a write interrupted by a crash. It
    /// is not counted as completed and is cut from the file so the next append
    /// starts on a line boundary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CheckpointOpen` if the file cannot be read,
    /// repaired, or opened for appending. Without it the run cannot record
    /// progress, so callers must not proceed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let open_err = |e: std::io::Error| StorageError::CheckpointOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio_fs::create_dir_all(parent).await.map_err(open_err)?;
        }

        let contents = match tokio_fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(open_err(e).into()),
        };
        let (keys, complete_len) = parse_keys(&contents);
        let discarded_partial = complete_len < contents.len();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(open_err)?;

        if discarded_partial {
            file.set_len(complete_len as u64).await.map_err(open_err)?;
            file.sync_data().await.map_err(open_err)?;
        }

        let loaded = keys.len();
        Ok(Self {
            path,
            file,
            keys,
            loaded,
            discarded_partial,
        })
    }

    /// Wrap an already open handle as an empty store
    ///
    /// Lets tests hand in a handle whose writes fail.
    #[cfg(feature = "test-util")]
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>, file: std::fs::File) -> Self {
        Self {
            path: path.into(),
            file: File::from_std(file),
            keys: HashSet::new(),
            loaded: 0,
            discarded_partial: false,
        }
    }

    /// Read the keys of a checkpoint without opening it for writing
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_keys(path: &Path) -> Result<HashSet<String>, Error> {
        match tokio_fs::read(path).await {
            Ok(bytes) => Ok(parse_keys(&bytes).0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(StorageError::from_io_with_path(&e, path).into()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contains(&self, id: &CrateId) -> bool {
        self.keys.contains(&id.key())
    }

    /// Number of distinct keys, including those recorded this run
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of distinct keys found at open
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// Whether open cut an interrupted trailing write
    #[must_use]
    pub fn discarded_partial(&self) -> bool {
        self.discarded_partial
    }

    /// Copy of the current key set for eligibility filtering
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Arc::new(self.keys.clone())
    }

    /// Durably record one completed crate version
    ///
    /// Returns `false` without touching the file when the key is already
    /// present, so a key is written at most once across any number of runs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CheckpointWrite` if the append, flush, or sync
    /// fails. The in-memory set is only updated after the line is durable.
    pub async fn record(&mut self, id: &CrateId) -> Result<bool, Error> {
        let key = id.key();
        if self.keys.contains(&key) {
            return Ok(false);
        }

        let mut line = Vec::with_capacity(key.len() + 1);
        line.extend_from_slice(key.as_bytes());
        line.push(b'\n');

        let write_err = |e: std::io::Error| StorageError::CheckpointWrite {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };
        self.file.write_all(&line).await.map_err(write_err)?;
        self.file.flush().await.map_err(write_err)?;
        self.file.sync_data().await.map_err(write_err)?;

        self.keys.insert(key);
        Ok(true)
    }

    /// Flush and close the checkpoint
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CheckpointWrite` if the final sync fails.
    pub async fn close(mut self) -> Result<(), Error> {
        let path = self.path.display().to_string();
        self.file
            .flush()
            .await
            .map_err(|e| StorageError::CheckpointWrite {
                path: path.clone(),
                message: e.to_string(),
            })?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StorageError::CheckpointWrite {
                path,
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Keys from every newline-terminated line, and the byte length they span
fn parse_keys(contents: &[u8]) -> (HashSet<String>, usize) {
    let complete_len = contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);

    let keys = contents[..complete_len]
        .split(|&b| b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    (keys, complete_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys_drops_partial_line() {
        let (keys, len) = parse_keys(b"a/1.0.0\nb/2.0.0\nc/3.");
        assert_eq!(len, 16);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("a/1.0.0"));
        assert!(!keys.iter().any(|k| k.starts_with('c')));
    }

    #[test]
    fn test_parse_keys_tolerates_blank_and_duplicate_lines() {
        let (keys, len) = parse_keys(b"a/1.0.0\n\na/1.0.0\r\n");
        assert_eq!(len, 18);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_parse_keys_empty() {
        let (keys, len) = parse_keys(b"");
        assert!(keys.is_empty());
        assert_eq!(len, 0);

        let (keys, len) = parse_keys(b"no-newline-at-all");
        assert!(keys.is_empty());
        assert_eq!(len, 0);
    }
}
