use ferry_types::CrateId;
use serde::{Deserialize, Serialize};

/// Outcome of a single unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// The unit of work completed and was checkpointed
    Succeeded { id: CrateId },

    /// The unit of work failed; one human-readable line
    Failed { id: CrateId, reason: String },

    /// An archive was written to the mirror
    Fetched {
        id: CrateId,
        bytes: u64,
        checksum: String,
    },
}
