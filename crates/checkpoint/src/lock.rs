//! Exclusive run lock

use ferry_errors::{Error, StorageError};
use ferry_types::SyncMode;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self as tokio_fs, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// RAII guard for `<state_dir>/<mode>.lock`
///
/// The file holds the owner's PID. It is removed on drop, but only while it
/// still holds our PID, so a lock broken and re-taken by another run survives.
///
/// A run killed before drop leaves its file behind. The next `acquire` takes
/// such a lock over once the recorded PID no longer names a live process.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    pid: u32,
    stale_holder: Option<u32>,
}

impl RunLock {
    /// Take the lock for `mode` under `state_dir`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::LockFailed` naming the holder if a live process
    /// holds the lock, or a storage error if the file cannot be created.
    pub async fn acquire(state_dir: &Path, mode: SyncMode) -> Result<Self, Error> {
        tokio_fs::create_dir_all(state_dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, state_dir))?;

        let path = crate::lock_path(state_dir, mode);
        let pid = std::process::id();
        let mut stale_holder = None;

        // Second attempt only after removing a dead holder's file
        let mut file = loop {
            match create_lock_file(&path).await {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let holder = read_holder(&path).await;
                    match holder {
                        Some(holder_pid)
                            if stale_holder.is_none()
                                && holder_pid != pid
                                && !process_alive(holder_pid) =>
                        {
                            match tokio_fs::remove_file(&path).await {
                                Ok(()) => {}
                                Err(e) if e.kind() == ErrorKind::NotFound => {}
                                Err(e) => {
                                    return Err(StorageError::from_io_with_path(&e, &path).into())
                                }
                            }
                            stale_holder = Some(holder_pid);
                        }
                        _ => {
                            return Err(StorageError::LockFailed {
                                path: path.display().to_string(),
                                holder: holder.map_or_else(
                                    || "unknown holder".to_string(),
                                    |pid| format!("pid {pid}"),
                                ),
                            }
                            .into());
                        }
                    }
                }
                Err(e) => return Err(StorageError::from_io_with_path(&e, &path).into()),
            }
        };

        let lock = Self {
            path,
            pid,
            stale_holder,
        };
        file.write_all(format!("{pid}\n").as_bytes())
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &lock.path))?;
        file.sync_data()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &lock.path))?;
        Ok(lock)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of a dead run whose leftover lock this one replaced
    #[must_use]
    pub fn stale_holder(&self) -> Option<u32> {
        self.stale_holder
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let ours = std::fs::read_to_string(&self.path)
            .is_ok_and(|contents| contents.trim() == self.pid.to_string());
        if ours {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn create_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// PID recorded in an existing lock file, if it can be read
async fn read_holder(path: &Path) -> Option<u32> {
    tokio_fs::read_to_string(path)
        .await
        .ok()
        .and_then(|contents| contents.trim().parse().ok())
}

/// Whether `pid` names a running process
///
/// Signal 0 probes for existence without delivering anything. `EPERM` means
/// the process exists under another user.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

// Without a liveness probe every recorded holder is treated as running
#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!process_alive(pid));
    }
}
