//! Fetch and verify operations

use crate::task::{FailureReason, Task, TaskKind};
use crate::worker::TaskRunner;
use async_trait::async_trait;
use dashmap::DashMap;
use ferry_errors::Error;
use ferry_events::{AppEvent, EventEmitter, EventSender, TaskEvent};
use ferry_hash::{verify_file, Checksum};
use ferry_index::archive_path;
use ferry_net::{download_to, DownloadUrl, NetClient};
use ferry_types::CrateId;
use std::path::PathBuf;
use std::sync::Arc;

/// Expected digests of the crate versions still awaiting verification
///
/// Entries are removed as their verification finishes, so the map only ever
/// holds the work that is left in this run.
pub type ExpectedChecksums = Arc<DashMap<CrateId, Checksum>>;

/// Downloads archives that are not yet in the mirror
pub struct FetchRunner {
    client: NetClient,
    url: DownloadUrl,
    archives: PathBuf,
    events: Option<EventSender>,
}

impl FetchRunner {
    #[must_use]
    pub fn new(client: NetClient, url: DownloadUrl, archives: impl Into<PathBuf>) -> Self {
        Self {
            client,
            url,
            archives: archives.into(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }
}

impl EventEmitter for FetchRunner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

#[async_trait]
impl TaskRunner for FetchRunner {
    async fn run(&self, task: &Task) -> Result<(), FailureReason> {
        let dest = archive_path(&self.archives, &task.id).map_err(Error::from)?;

        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            self.emit_debug(format!("{}: already mirrored", task.id));
            return Ok(());
        }

        let url = self.url.resolve(&task.id)?;
        let download = download_to(&self.client, &url, &dest).await?;

        self.emit(AppEvent::Task(TaskEvent::Fetched {
            id: task.id.clone(),
            bytes: download.size,
            checksum: download.checksum.to_hex(),
        }));
        Ok(())
    }
}

/// Recomputes archive digests and compares them with the index
pub struct VerifyRunner {
    archives: PathBuf,
    expected: ExpectedChecksums,
}

impl VerifyRunner {
    #[must_use]
    pub fn new(archives: impl Into<PathBuf>, expected: ExpectedChecksums) -> Self {
        Self {
            archives: archives.into(),
            expected,
        }
    }
}

#[async_trait]
impl TaskRunner for VerifyRunner {
    async fn run(&self, task: &Task) -> Result<(), FailureReason> {
        let expected = match &task.kind {
            TaskKind::Verify { expected } => *expected,
            TaskKind::Fetch => self
                .expected
                .get(&task.id)
                .map(|entry| *entry.value())
                .ok_or_else(|| FailureReason::Storage {
                    message: format!("no expected checksum for {}", task.id),
                })?,
        };

        let result = match archive_path(&self.archives, &task.id) {
            Ok(path) => verify_file(&path, &expected).await,
            Err(e) => Err(e.into()),
        };
        self.expected.remove(&task.id);

        match result {
            Ok((true, _)) => Ok(()),
            Ok((false, actual)) => Err(FailureReason::Mismatch { expected, actual }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_archive(root: &std::path::Path, id: &CrateId, contents: &[u8]) {
        let path = archive_path(root, id).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_verify_match_and_mismatch() {
        let temp = tempdir().unwrap();
        let good = CrateId::new("itoa", "1.0.0");
        let bad = CrateId::new("ryu", "1.0.0");
        write_archive(temp.path(), &good, b"itoa archive");
        write_archive(temp.path(), &bad, b"tampered");

        let expected: ExpectedChecksums = Arc::default();
        let good_sum = Checksum::from_data(b"itoa archive");
        let bad_sum = Checksum::from_data(b"ryu archive");
        expected.insert(good.clone(), good_sum);
        expected.insert(bad.clone(), bad_sum);

        let runner = VerifyRunner::new(temp.path(), Arc::clone(&expected));
        runner.run(&Task::verify(good.clone(), good_sum)).await.unwrap();

        let err = runner
            .run(&Task::verify(bad.clone(), bad_sum))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FailureReason::Mismatch {
                expected: bad_sum,
                actual: Checksum::from_data(b"tampered"),
            }
        );

        // Finished entries leave the map either way
        assert!(expected.is_empty());
    }

    #[tokio::test]
    async fn test_verify_missing_archive_is_a_failure() {
        let temp = tempdir().unwrap();
        let id = CrateId::new("gone", "0.1.0");
        let runner = VerifyRunner::new(temp.path(), Arc::default());

        let err = runner
            .run(&Task::verify(id, Checksum::from_data(b"x")))
            .await
            .unwrap_err();
        assert!(matches!(err, FailureReason::Storage { .. }));
    }

    #[tokio::test]
    async fn test_fetch_skips_existing_archive() {
        let temp = tempdir().unwrap();
        let id = CrateId::new("libc", "0.2.0");
        write_archive(temp.path(), &id, b"already here");

        // Port 1 refuses connections; reaching the network would fail the task
        let url = DownloadUrl::new("http://127.0.0.1:1/crates").unwrap();
        let runner = FetchRunner::new(NetClient::with_defaults().unwrap(), url, temp.path());
        runner.run(&Task::fetch(id)).await.unwrap();
    }
}
