//! Structured logging integration for events
//!
//! Converts every `AppEvent` into a `tracing` record with structured fields.
//! Levels follow `AppEvent::log_level`, targets follow `AppEvent::log_target`.

use ferry_events::{AppEvent, GeneralEvent, IndexEvent, RunEvent, TaskEvent};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(event: &AppEvent) {
    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(target: "ferry::events::general", context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(target: "ferry::events::general", details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(target: "ferry::events::general", context = ?context, "{message}");
            }
        },

        AppEvent::Index(index) => match index {
            IndexEvent::ShardSkipped { path, reason } => {
                warn!(
                    target: "ferry::events::index",
                    path = %path.display(),
                    reason = %reason,
                    "Skipped unreadable shard"
                );
            }
            IndexEvent::RecordSkipped { path, line, reason } => {
                warn!(
                    target: "ferry::events::index",
                    path = %path.display(),
                    line = line,
                    reason = %reason,
                    "Skipped malformed record"
                );
            }
            IndexEvent::WalkCompleted {
                records,
                parse_errors,
            } => {
                info!(
                    target: "ferry::events::index",
                    records = records,
                    parse_errors = parse_errors,
                    "Index walk completed"
                );
            }
        },

        AppEvent::Task(task) => match task {
            TaskEvent::Succeeded { id } => {
                debug!(target: "ferry::events::task", crate_name = %id.name, version = %id.version, "Done");
            }
            // One line per failure: `name/version: reason`
            TaskEvent::Failed { id, reason } => {
                error!(
                    target: "ferry::events::task",
                    crate_name = %id.name,
                    version = %id.version,
                    "{id}: {reason}"
                );
            }
            TaskEvent::Fetched {
                id,
                bytes,
                checksum,
            } => {
                debug!(
                    target: "ferry::events::task",
                    crate_name = %id.name,
                    version = %id.version,
                    bytes = bytes,
                    sha256 = %checksum,
                    "Archive written"
                );
            }
        },

        AppEvent::Run(run) => match run {
            RunEvent::Started {
                mode,
                workers,
                queue_capacity,
                resumed,
            } => {
                info!(
                    target: "ferry::events::run",
                    mode = %mode,
                    workers = workers,
                    queue_capacity = queue_capacity,
                    resumed = resumed,
                    "Run started"
                );
            }
            RunEvent::Interrupted => {
                warn!(
                    target: "ferry::events::run",
                    "Interrupted; finishing in-flight work and saving the checkpoint"
                );
            }
            RunEvent::Aborted { failure } => {
                error!(
                    target: "ferry::events::run",
                    code = failure.code.as_deref().unwrap_or("-"),
                    hint = failure.hint.as_deref().unwrap_or("-"),
                    "Run aborted: {}",
                    failure.message
                );
            }
            RunEvent::Completed {
                mode,
                enqueued,
                succeeded,
                failed,
                skipped,
                cancelled,
                elapsed,
            } => {
                info!(
                    target: "ferry::events::run",
                    mode = %mode,
                    enqueued = enqueued,
                    succeeded = succeeded,
                    failed = failed,
                    skipped = skipped,
                    cancelled = cancelled,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Run completed"
                );
            }
        },
    }
}
