#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Durable run state for ferry
//!
//! A checkpoint is an append-only text file with one `name/version` key per
//! line, written once when a crate version completes. Loading it at startup
//! tells the next run what it can skip. A run lock keeps two processes from
//! appending to the same checkpoint.

mod lock;
mod store;

pub use lock::RunLock;
pub use store::{CheckpointStore, Snapshot};

use ferry_types::SyncMode;
use std::path::{Path, PathBuf};

/// Checkpoint file for a mode: `<state_dir>/<mode>.checkpoint`
#[must_use]
pub fn checkpoint_path(state_dir: &Path, mode: SyncMode) -> PathBuf {
    state_dir.join(format!("{}.checkpoint", mode.as_str()))
}

/// Lock file for a mode: `<state_dir>/<mode>.lock`
#[must_use]
pub fn lock_path(state_dir: &Path, mode: SyncMode) -> PathBuf {
    state_dir.join(format!("{}.lock", mode.as_str()))
}
