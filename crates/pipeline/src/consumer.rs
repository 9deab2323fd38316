//! Result consumers
//!
//! Each consumer drains one result channel until every worker has dropped its
//! sender. The success consumer is the only writer to the checkpoint.

use crate::task::{Failure, Success};
use ferry_checkpoint::CheckpointStore;
use ferry_errors::Error;
use ferry_events::{AppEvent, EventEmitter, EventSender, FailureContext, RunEvent};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Persists successes to the checkpoint
pub struct SuccessConsumer {
    rx: mpsc::Receiver<Success>,
    store: CheckpointStore,
    cancel: CancellationToken,
    events: Option<EventSender>,
}

impl SuccessConsumer {
    #[must_use]
    pub fn new(
        rx: mpsc::Receiver<Success>,
        store: CheckpointStore,
        cancel: CancellationToken,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            rx,
            store,
            cancel,
            events,
        }
    }

    /// Drain successes into the checkpoint
    ///
    /// Returns the store and the number of successes recorded.
    ///
    /// # Errors
    ///
    /// A failed checkpoint append cancels the run and is returned: progress
    /// can no longer be saved, so nothing else should be attempted.
    pub async fn run(mut self) -> Result<(CheckpointStore, u64), Error> {
        let mut succeeded = 0;
        while let Some(success) = self.rx.recv().await {
            if let Err(e) = self.store.record(&success.id).await {
                self.cancel.cancel();
                self.emit(AppEvent::Run(RunEvent::Aborted {
                    failure: FailureContext::from_error(&e),
                }));
                return Err(e);
            }
            succeeded += 1;
            self.emit_task_succeeded(&success.id);
        }
        Ok((self.store, succeeded))
    }
}

impl EventEmitter for SuccessConsumer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

#[derive(Serialize)]
struct FailureLine<'a> {
    #[serde(rename = "crate")]
    name: &'a str,
    version: &'a str,
    reason: String,
}

/// Reports failures; never touches the checkpoint
pub struct FailureConsumer {
    rx: mpsc::Receiver<Failure>,
    report: Option<PathBuf>,
    events: Option<EventSender>,
}

impl FailureConsumer {
    #[must_use]
    pub fn new(
        rx: mpsc::Receiver<Failure>,
        report: Option<PathBuf>,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            rx,
            report,
            events,
        }
    }

    /// Drain failures, returning how many were seen
    ///
    /// Trouble with the report file is logged and the report abandoned; the
    /// diagnostics still go out as events.
    pub async fn run(mut self) -> u64 {
        let mut report = match self.report.take() {
            Some(path) => self.open_report(path).await,
            None => None,
        };

        let mut failed = 0;
        while let Some(failure) = self.rx.recv().await {
            failed += 1;
            let reason = failure.reason.to_string();

            if let Some((path, file)) = report.as_mut() {
                let line = FailureLine {
                    name: &failure.id.name,
                    version: &failure.id.version,
                    reason: reason.clone(),
                };
                if let Err(e) = write_line(file, &line).await {
                    self.emit_warning_with_context(
                        format!("failure report disabled: {e}"),
                        path.display().to_string(),
                    );
                    report = None;
                }
            }

            self.emit_task_failed(&failure.id, reason);
        }

        if let Some((path, mut file)) = report {
            if let Err(e) = file.flush().await {
                self.emit_warning_with_context(
                    format!("cannot flush failure report: {e}"),
                    path.display().to_string(),
                );
            }
        }
        failed
    }

    async fn open_report(&self, path: PathBuf) -> Option<(PathBuf, File)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                self.emit_warning_with_context(
                    format!("cannot create failure report directory: {e}"),
                    parent.display().to_string(),
                );
                return None;
            }
        }
        match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(file) => Some((path, file)),
            Err(e) => {
                self.emit_warning_with_context(
                    format!("cannot open failure report: {e}"),
                    path.display().to_string(),
                );
                None
            }
        }
    }
}

impl EventEmitter for FailureConsumer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

async fn write_line(file: &mut File, line: &FailureLine<'_>) -> Result<(), Error> {
    let mut bytes = serde_json::to_vec(line)?;
    bytes.push(b'\n');
    file.write_all(&bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FailureReason;
    use ferry_errors::StorageError;
    use ferry_events::GeneralEvent;
    use ferry_types::CrateId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_failed_append_cancels_and_stops_recording() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fetch.checkpoint");
        std::fs::write(&path, "").unwrap();
        let store = CheckpointStore::from_file(&path, std::fs::File::open(&path).unwrap());

        let (tx, rx) = mpsc::channel(4);
        let (events, mut event_rx) = ferry_events::channel();
        let cancel = CancellationToken::new();
        for version in ["1.0.0", "1.0.1"] {
            tx.send(Success {
                id: CrateId::new("serde", version),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let err = SuccessConsumer::new(rx, store, cancel.clone(), Some(events))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Storage(StorageError::CheckpointWrite { .. })
        ));
        assert!(cancel.is_cancelled());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        let event = event_rx.try_recv().unwrap();
        assert!(matches!(event, AppEvent::Run(RunEvent::Aborted { .. })));
        // Nothing after the failed append
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unusable_report_path_is_reported() {
        let dir = tempdir().unwrap();
        // A regular file where the report's parent directory should be
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "").unwrap();

        let (tx, rx) = mpsc::channel(4);
        let (events, mut event_rx) = ferry_events::channel();
        tx.send(Failure {
            id: CrateId::new("serde", "1.0.0"),
            reason: FailureReason::Storage {
                message: "gone".to_string(),
            },
        })
        .await
        .unwrap();
        drop(tx);

        let failed = FailureConsumer::new(rx, Some(blocker.join("failures.jsonl")), Some(events))
            .run()
            .await;

        assert_eq!(failed, 1);
        match event_rx.try_recv().unwrap() {
            AppEvent::General(GeneralEvent::Warning { context, .. }) => {
                assert_eq!(context, Some(blocker.display().to_string()));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            AppEvent::Task(ferry_events::TaskEvent::Failed { .. })
        ));
    }
}
