use super::FailureContext;
use ferry_types::SyncMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of a mirror run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// Workers and consumers are up, the index walk is starting
    Started {
        mode: SyncMode,
        workers: usize,
        queue_capacity: usize,
        /// Entries already in the checkpoint at startup
        resumed: usize,
    },

    /// External cancellation was observed; no new tasks will be enqueued
    Interrupted,

    /// A store-level error terminated the run
    Aborted { failure: FailureContext },

    /// Final accounting for the run
    Completed {
        mode: SyncMode,
        enqueued: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
        cancelled: bool,
        elapsed: Duration,
    },
}
