//! Run orchestration
//!
//! Startup: snapshot the checkpoint, start consumers and workers, then walk
//! the index on a blocking thread, enqueuing every eligible record. The walk
//! suspends whenever the queue is full, so memory for pending work stays
//! bounded by the queue capacity.
//!
//! Shutdown: once the walk ends, wait until every enqueued task has been
//! processed, let workers exit on the closed queue, drain both result
//! channels, and close the checkpoint. On cancellation the walk stops, workers
//! get `shutdown_grace` to finish what they hold, and the checkpoint is still
//! closed cleanly.

use crate::consumer::{FailureConsumer, SuccessConsumer};
use crate::queue::{task_queue, QueueSender};
use crate::report::RunReport;
use crate::runners::{ExpectedChecksums, VerifyRunner};
use crate::task::Task;
use crate::worker::{OutcomeSenders, TaskRunner, WorkerPool};
use dashmap::DashMap;
use ferry_checkpoint::{CheckpointStore, Snapshot};
use ferry_config::Config;
use ferry_errors::{ConfigError, Error, IndexError};
use ferry_events::{AppEvent, EventEmitter, EventSender, IndexEvent, RunEvent};
use ferry_index::{archive_path, IndexReader, Records};
use ferry_types::SyncMode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Tunables for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// How long in-flight tasks may run on after cancellation
    pub shutdown_grace: Duration,
    /// Restrict the walk to these crate names; empty walks the whole index
    pub crates: Vec<String>,
    /// Append one JSON line per failure to this file
    pub failure_report: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: ferry_config::constants::DEFAULT_WORKERS,
            queue_capacity: ferry_config::constants::DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: Duration::from_secs(
                ferry_config::constants::DEFAULT_SHUTDOWN_GRACE_SECS,
            ),
            crates: Vec::new(),
            failure_report: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.general.workers,
            queue_capacity: config.general.queue_capacity,
            shutdown_grace: config.shutdown_grace(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("workers", self.workers),
            ("queue_capacity", self.queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// What the run does with each eligible crate version
pub enum Operation {
    /// Fetch with the given runner, typically a [`FetchRunner`](crate::FetchRunner)
    Fetch(Arc<dyn TaskRunner>),
    /// Verify archives under `archives` against the index checksums
    Verify {
        archives: PathBuf,
        /// Leave versions with no local archive out of the run
        skip_missing: bool,
    },
}

impl Operation {
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        match self {
            Self::Fetch(_) => SyncMode::Fetch,
            Self::Verify { .. } => SyncMode::Verify,
        }
    }
}

/// Owns every component of one run
pub struct Orchestrator {
    index: IndexReader,
    checkpoint: CheckpointStore,
    operation: Operation,
    config: PipelineConfig,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        index: IndexReader,
        checkpoint: CheckpointStore,
        operation: Operation,
        config: PipelineConfig,
    ) -> Self {
        Self {
            index,
            checkpoint,
            operation,
            config,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Observe `cancel` for external interruption
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the run to completion or cancellation
    ///
    /// Per-crate failures are counted in the report, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or crate names, and when
    /// the checkpoint cannot be written. A checkpoint failure stops the run.
    pub async fn run(self) -> Result<RunReport, Error> {
        let started = Instant::now();
        let Self {
            index,
            checkpoint,
            operation,
            config,
            events,
            cancel,
        } = self;

        config.validate()?;
        let mode = operation.mode();
        let records = open_records(&index, &config.crates)?;
        let snapshot = checkpoint.snapshot();
        let run_token = cancel.child_token();

        events.emit(AppEvent::Run(RunEvent::Started {
            mode,
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            resumed: snapshot.len(),
        }));

        let (runner, expected, records): (Arc<dyn TaskRunner>, Option<ExpectedChecksums>, Records) =
            match operation {
                Operation::Fetch(runner) => (runner, None, records),
                Operation::Verify {
                    archives,
                    skip_missing,
                } => {
                    let expected = collect_expected(
                        records,
                        Arc::clone(&snapshot),
                        archives.clone(),
                        skip_missing,
                        run_token.clone(),
                    )
                    .await?;
                    let runner = VerifyRunner::new(archives, Arc::clone(&expected));
                    // Second walk over the same records, this time enqueuing
                    let records = open_records(&index, &config.crates)?;
                    (Arc::new(runner), Some(expected), records)
                }
            };

        let (sender, receiver, tracker) = task_queue(config.queue_capacity);
        let (success_tx, success_rx) = mpsc::channel(config.queue_capacity);
        let (failure_tx, failure_rx) = mpsc::channel(config.queue_capacity);
        let outcomes = OutcomeSenders {
            success: success_tx,
            failure: failure_tx,
        };

        let success = tokio::spawn(
            SuccessConsumer::new(success_rx, checkpoint, run_token.clone(), events.clone()).run(),
        );
        let failure = tokio::spawn(
            FailureConsumer::new(failure_rx, config.failure_report.clone(), events.clone()).run(),
        );
        let pool = WorkerPool::spawn(config.workers, &receiver, &runner, &outcomes, &run_token);
        // Workers hold the only receivers and result senders from here on, so
        // their exit closes the queue and lets the consumers finish.
        drop(receiver);
        drop(outcomes);

        let producer = Producer {
            sender,
            snapshot,
            expected,
            events: events.clone(),
            cancel: run_token.clone(),
        };
        let mut walk_handle = tokio::task::spawn_blocking(move || producer.run(records));

        let mut walk = None;
        tokio::select! {
            result = &mut walk_handle => walk = Some(result),
            () = run_token.cancelled() => {}
        }
        if walk.is_some() {
            tokio::select! {
                () = tracker.join() => {}
                () = run_token.cancelled() => {}
            }
        }

        let cancelled = run_token.is_cancelled();
        if cancel.is_cancelled() {
            events.emit(AppEvent::Run(RunEvent::Interrupted));
        }
        let aborted_workers = if cancelled {
            pool.shutdown(config.shutdown_grace).await
        } else {
            pool.join().await;
            0
        };

        let walk = match walk {
            Some(result) => result,
            None => walk_handle.await,
        }
        .map_err(|e| Error::internal(format!("index walk failed: {e}")));

        let failed = failure
            .await
            .map_err(|e| Error::internal(format!("failure consumer failed: {e}")))?;
        let (store, succeeded) = success
            .await
            .map_err(|e| Error::internal(format!("success consumer failed: {e}")))??;
        store.close().await?;
        let walk = walk?;

        let mut report = RunReport::new(mode);
        report.seen = walk.seen;
        report.yanked = walk.yanked;
        report.already_done = walk.already_done;
        report.duplicates = walk.duplicates;
        report.missing = walk.missing;
        report.parse_errors = walk.parse_errors;
        report.enqueued = tracker.enqueued();
        report.succeeded = succeeded;
        report.failed = failed;
        report.peak_queue = tracker.peak_occupancy();
        report.aborted_workers = aborted_workers;
        report.cancelled = cancelled;
        report.elapsed = started.elapsed();

        events.emit(AppEvent::Run(RunEvent::Completed {
            mode,
            enqueued: report.enqueued,
            succeeded: report.succeeded,
            failed: report.failed,
            skipped: report.skipped(),
            cancelled: report.cancelled,
            elapsed: report.elapsed,
        }));

        Ok(report)
    }
}

fn open_records(index: &IndexReader, crates: &[String]) -> Result<Records, Error> {
    if crates.is_empty() {
        Ok(index.records())
    } else {
        index.packages(crates)
    }
}

/// First verify pass: expected checksum of every eligible record
///
/// Parse errors are left for the enqueue pass to report.
async fn collect_expected(
    records: Records,
    snapshot: Snapshot,
    archives: PathBuf,
    skip_missing: bool,
    cancel: CancellationToken,
) -> Result<ExpectedChecksums, Error> {
    tokio::task::spawn_blocking(move || {
        let expected: ExpectedChecksums = Arc::new(DashMap::new());
        for record in records.flatten() {
            if cancel.is_cancelled() {
                break;
            }
            if record.yanked {
                continue;
            }
            let id = record.id();
            if snapshot.contains(&id.key()) {
                continue;
            }
            if skip_missing && !archive_path(&archives, &id).is_ok_and(|path| path.is_file()) {
                continue;
            }
            expected.insert(id, record.checksum);
        }
        expected
    })
    .await
    .map_err(|e| Error::internal(format!("checksum collection failed: {e}")))
}

#[derive(Debug, Default)]
struct WalkStats {
    seen: u64,
    yanked: u64,
    already_done: u64,
    duplicates: u64,
    missing: u64,
    parse_errors: u64,
}

/// The enqueue side of the walk; runs on a blocking thread
struct Producer {
    sender: QueueSender,
    snapshot: Snapshot,
    expected: Option<ExpectedChecksums>,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl EventEmitter for Producer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Producer {
    fn run(mut self, records: Records) -> WalkStats {
        let mut stats = WalkStats::default();

        for item in records {
            if self.cancel.is_cancelled() {
                return stats;
            }
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    stats.parse_errors += 1;
                    self.report_index_error(e);
                    continue;
                }
            };
            stats.seen += 1;

            if record.yanked {
                stats.yanked += 1;
                continue;
            }
            let id = record.id();
            if self.snapshot.contains(&id.key()) {
                stats.already_done += 1;
                continue;
            }
            if self.sender.contains(&id) {
                stats.duplicates += 1;
                continue;
            }

            let task = match &self.expected {
                None => Task::fetch(id),
                Some(expected) => {
                    // Copy out so no map guard is held while blocked on the queue
                    let Some(checksum) = expected.get(&id).map(|entry| *entry.value()) else {
                        stats.missing += 1;
                        continue;
                    };
                    Task::verify(id, checksum)
                }
            };

            if self.sender.blocking_enqueue(task).is_err() {
                return stats;
            }
        }

        self.emit(AppEvent::Index(IndexEvent::WalkCompleted {
            records: stats.seen,
            parse_errors: stats.parse_errors,
        }));
        stats
    }

    fn report_index_error(&self, error: IndexError) {
        let event = match error {
            IndexError::MalformedRecord {
                path,
                line,
                message,
            } => IndexEvent::RecordSkipped {
                path: path.into(),
                line,
                reason: message,
            },
            IndexError::UnreadableShard { path, message } => IndexEvent::ShardSkipped {
                path: path.into(),
                reason: message,
            },
            other => {
                self.emit_warning(other.to_string());
                return;
            }
        };
        self.emit(AppEvent::Index(event));
    }
}
