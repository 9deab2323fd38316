//! Lazy walk over every version record in the index

use crate::config::INDEX_CONFIG_FILE;
use crate::models::VersionRecord;
use crate::shard::shard_path;
use ferry_errors::{Error, IndexError};
use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

type ShardIter = Box<dyn Iterator<Item = Result<PathBuf, IndexError>> + Send>;

/// Read-only view of a registry index checkout
#[derive(Debug, Clone)]
pub struct IndexReader {
    root: PathBuf,
}

impl IndexReader {
    /// Open an index rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns `IndexError::RootNotFound` if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IndexError::RootNotFound {
                path: root.display().to_string(),
            }
            .into());
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every record of every shard, in sorted path order
    ///
    /// Unreadable shards and malformed lines surface as `Err` items; the walk
    /// continues past them.
    #[must_use]
    pub fn records(&self) -> Records {
        Records::new(Box::new(self.shards()))
    }

    /// Records of a single crate, located through its shard path
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be sharded.
    pub fn package(&self, name: &str) -> Result<Records, Error> {
        let mut path = self.root.clone();
        for component in shard_path(name)?.split('/') {
            path.push(component);
        }
        Ok(Records::new(Box::new(std::iter::once(Ok(path)))))
    }

    /// Records of several crates, in the order given
    ///
    /// # Errors
    ///
    /// Returns an error if any name cannot be sharded.
    pub fn packages<S: AsRef<str>>(&self, names: &[S]) -> Result<Records, Error> {
        let mut paths = Vec::with_capacity(names.len());
        for name in names {
            let mut path = self.root.clone();
            for component in shard_path(name.as_ref())?.split('/') {
                path.push(component);
            }
            paths.push(Ok(path));
        }
        Ok(Records::new(Box::new(paths.into_iter())))
    }

    fn shards(&self) -> impl Iterator<Item = Result<PathBuf, IndexError>> + Send + 'static {
        let root = self.root.clone();
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if entry.depth() == 1 && entry.file_name() == INDEX_CONFIG_FILE {
                        None
                    } else {
                        Some(Ok(entry.into_path()))
                    }
                }
                Ok(_) => None,
                Err(e) => Some(Err(IndexError::UnreadableShard {
                    path: e
                        .path()
                        .unwrap_or(&root)
                        .display()
                        .to_string(),
                    message: e.to_string(),
                })),
            })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

struct ShardLines {
    path: PathBuf,
    lines: Split<BufReader<File>>,
    line_no: usize,
}

/// Lazy iterator over version records
///
/// Holds at most one open shard at a time, so memory stays flat regardless of
/// index size.
pub struct Records {
    shards: ShardIter,
    current: Option<ShardLines>,
}

impl Records {
    fn new(shards: ShardIter) -> Self {
        Self {
            shards,
            current: None,
        }
    }
}

impl Iterator for Records {
    type Item = Result<VersionRecord, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(shard) = self.current.as_mut() {
                match shard.lines.next() {
                    Some(Ok(bytes)) => {
                        shard.line_no += 1;
                        let Ok(line) = std::str::from_utf8(&bytes) else {
                            return Some(Err(IndexError::MalformedRecord {
                                path: shard.path.display().to_string(),
                                line: shard.line_no,
                                message: "invalid UTF-8".to_string(),
                            }));
                        };
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        return Some(VersionRecord::parse_line(line).map_err(|message| {
                            IndexError::MalformedRecord {
                                path: shard.path.display().to_string(),
                                line: shard.line_no,
                                message,
                            }
                        }));
                    }
                    Some(Err(e)) => {
                        // Abandon the rest of this shard rather than spin on a failing read.
                        let path = shard.path.display().to_string();
                        self.current = None;
                        return Some(Err(IndexError::UnreadableShard {
                            path,
                            message: e.to_string(),
                        }));
                    }
                    None => self.current = None,
                }
            }

            match self.shards.next()? {
                Ok(path) => match File::open(&path) {
                    Ok(file) => {
                        self.current = Some(ShardLines {
                            path,
                            lines: BufReader::new(file).split(b'\n'),
                            line_no: 0,
                        });
                    }
                    Err(e) => {
                        return Some(Err(IndexError::UnreadableShard {
                            path: path.display().to_string(),
                            message: e.to_string(),
                        }));
                    }
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
