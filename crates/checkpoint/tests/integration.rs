//! Integration tests for checkpoint crate

#[cfg(test)]
mod tests {
    use ferry_checkpoint::*;
    use ferry_errors::{Error, StorageError};
    use ferry_types::{CrateId, SyncMode};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        let path = checkpoint_path(&temp.path().join("state"), SyncMode::Fetch);

        let store = CheckpointStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.loaded(), 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_record_persists_across_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("fetch.checkpoint");
        let serde = CrateId::new("serde", "1.0.0");

        let mut store = CheckpointStore::open(&path).await.unwrap();
        assert!(store.record(&serde).await.unwrap());
        assert!(store.contains(&serde));
        store.close().await.unwrap();

        let store = CheckpointStore::open(&path).await.unwrap();
        assert_eq!(store.loaded(), 1);
        assert!(store.contains(&serde));
        assert!(!store.contains(&CrateId::new("serde", "1.0.1")));
    }

    #[tokio::test]
    async fn test_no_double_record() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("verify.checkpoint");
        let id = CrateId::new("rand", "0.8.5");

        for _ in 0..3 {
            let mut store = CheckpointStore::open(&path).await.unwrap();
            store.record(&id).await.unwrap();
            assert!(!store.record(&id).await.unwrap());
            store.close().await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "rand/0.8.5\n");
    }

    #[tokio::test]
    async fn test_partial_trailing_line_is_truncated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("fetch.checkpoint");
        std::fs::write(&path, "libc/0.2.0\ntokio/1.0").unwrap();

        let mut store = CheckpointStore::open(&path).await.unwrap();
        assert!(store.discarded_partial());
        assert_eq!(store.loaded(), 1);
        assert!(!store.contains(&CrateId::new("tokio", "1.0")));

        store.record(&CrateId::new("tokio", "1.0.0")).await.unwrap();
        store.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "libc/0.2.0\ntokio/1.0.0\n");
    }

    #[tokio::test]
    async fn test_snapshot_is_frozen() {
        let temp = tempdir().unwrap();
        let mut store = CheckpointStore::open(temp.path().join("c")).await.unwrap();
        store.record(&CrateId::new("a", "1.0.0")).await.unwrap();

        let snapshot = store.snapshot();
        store.record(&CrateId::new("b", "1.0.0")).await.unwrap();

        assert!(snapshot.contains("a/1.0.0"));
        assert!(!snapshot.contains("b/1.0.0"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_read_keys() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("fetch.checkpoint");
        assert!(CheckpointStore::read_keys(&path).await.unwrap().is_empty());

        std::fs::write(&path, "a/1\nb/2\nb/2\nc/").unwrap();
        let keys = CheckpointStore::read_keys(&path).await.unwrap();
        assert_eq!(keys.len(), 2);
        // Reading never repairs the file
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a/1\nb/2\nb/2\nc/");
    }

    #[tokio::test]
    async fn test_lock_contention() {
        let temp = tempdir().unwrap();

        let lock = RunLock::acquire(temp.path(), SyncMode::Fetch).await.unwrap();
        let err = RunLock::acquire(temp.path(), SyncMode::Fetch)
            .await
            .unwrap_err();
        match err {
            Error::Storage(StorageError::LockFailed { holder, .. }) => {
                assert_eq!(holder, format!("pid {}", std::process::id()));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Other modes are independent
        let _verify = RunLock::acquire(temp.path(), SyncMode::Verify).await.unwrap();

        let lock_file = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_file.exists());
        RunLock::acquire(temp.path(), SyncMode::Fetch).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_lock_left_in_place() {
        let temp = tempdir().unwrap();
        let lock = RunLock::acquire(temp.path(), SyncMode::Fetch).await.unwrap();
        std::fs::write(lock.path(), "999999\n").unwrap();

        let lock_file = lock.path().to_path_buf();
        drop(lock);
        assert!(lock_file.exists());
    }

    /// PID of a process that has already exited and been reaped
    #[cfg(unix)]
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_left_by_killed_run_is_taken_over() {
        let temp = tempdir().unwrap();
        let lock_file = lock_path(temp.path(), SyncMode::Fetch);
        let killed = dead_pid();
        std::fs::write(&lock_file, format!("{killed}\n")).unwrap();

        let lock = RunLock::acquire(temp.path(), SyncMode::Fetch).await.unwrap();
        assert_eq!(lock.stale_holder(), Some(killed));
        assert_eq!(
            std::fs::read_to_string(&lock_file).unwrap().trim(),
            std::process::id().to_string()
        );

        drop(lock);
        assert!(!lock_file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_held_by_live_process_is_refused() {
        let temp = tempdir().unwrap();
        let lock_file = lock_path(temp.path(), SyncMode::Verify);
        let mut holder = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(&lock_file, format!("{}\n", holder.id())).unwrap();

        let result = RunLock::acquire(temp.path(), SyncMode::Verify).await;
        holder.kill().unwrap();
        holder.wait().unwrap();

        match result {
            Err(Error::Storage(StorageError::LockFailed { holder: name, .. })) => {
                assert_eq!(name, format!("pid {}", holder.id()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(lock_file.exists());
    }

    #[tokio::test]
    async fn test_unreadable_lock_is_refused() {
        let temp = tempdir().unwrap();
        let lock_file = lock_path(temp.path(), SyncMode::Fetch);
        std::fs::write(&lock_file, "").unwrap();

        let err = RunLock::acquire(temp.path(), SyncMode::Fetch)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::LockFailed { ref holder, .. }) if holder == "unknown holder"
        ));
    }
}
