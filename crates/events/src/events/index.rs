use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events raised while walking the registry index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IndexEvent {
    /// A whole shard file could not be read
    ShardSkipped { path: PathBuf, reason: String },

    /// One line of a shard could not be parsed
    RecordSkipped {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The walk reached the end of the index
    WalkCompleted { records: u64, parse_errors: u64 },
}
