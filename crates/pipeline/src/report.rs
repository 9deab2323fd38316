//! Run accounting

use ferry_types::SyncMode;
use serde::Serialize;
use std::time::Duration;

/// Summary of one orchestrated run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub mode: SyncMode,
    /// Version records parsed from the index
    pub seen: u64,
    pub yanked: u64,
    /// Skipped because the checkpoint already had them at startup
    pub already_done: u64,
    /// Repeated within this walk
    pub duplicates: u64,
    /// Verify only: archive absent and `skip_missing` set
    pub missing: u64,
    /// Malformed lines and unreadable shards
    pub parse_errors: u64,
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub peak_queue: usize,
    /// Workers still busy when the shutdown grace ran out
    pub aborted_workers: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            seen: 0,
            yanked: 0,
            already_done: 0,
            duplicates: 0,
            missing: 0,
            parse_errors: 0,
            enqueued: 0,
            succeeded: 0,
            failed: 0,
            peak_queue: 0,
            aborted_workers: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Records that were not turned into tasks
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.yanked + self.already_done + self.duplicates + self.missing
    }

    /// Every enqueued task produced exactly one outcome
    #[must_use]
    pub fn is_accounted(&self) -> bool {
        self.succeeded + self.failed == self.enqueued
    }

    /// Nothing failed and the run was not cut short
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.is_accounted()
    }
}
