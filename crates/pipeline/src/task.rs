//! Units of work and their outcomes

use ferry_errors::Error;
use ferry_hash::Checksum;
use ferry_types::CrateId;
use serde::Serialize;
use std::fmt;

/// What a worker does with a crate version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Make sure the archive exists in the mirror
    Fetch,
    /// Recompute the archive digest and compare it with `expected`
    Verify { expected: Checksum },
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: CrateId,
    pub kind: TaskKind,
}

impl Task {
    #[must_use]
    pub fn fetch(id: CrateId) -> Self {
        Self {
            id,
            kind: TaskKind::Fetch,
        }
    }

    #[must_use]
    pub fn verify(id: CrateId, expected: Checksum) -> Self {
        Self {
            id,
            kind: TaskKind::Verify { expected },
        }
    }
}

/// Why a unit of work failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The upstream did not deliver the archive. `status` is the HTTP status,
    /// or zero when no response was received.
    Transport { status: u16, message: String },

    /// The local archive does not hash to the indexed checksum
    Mismatch { expected: Checksum, actual: Checksum },

    /// Local filesystem trouble: unreadable archive, unwritable mirror
    Storage { message: String },
}

impl From<Error> for FailureReason {
    fn from(error: Error) -> Self {
        match error {
            Error::Network(e) => Self::Transport {
                status: e.status_code(),
                message: e.to_string(),
            },
            Error::Storage(e) => Self::Storage {
                message: e.to_string(),
            },
            Error::Index(e) => Self::Storage {
                message: e.to_string(),
            },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { status: 0, message } => write!(f, "transport error: {message}"),
            Self::Transport { status, message } => {
                write!(f, "transport error (status {status}): {message}")
            }
            Self::Mismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, computed {actual}")
            }
            Self::Storage { message } => write!(f, "storage error: {message}"),
        }
    }
}

/// A unit of work that completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success {
    pub id: CrateId,
}

/// A unit of work that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub id: CrateId,
    pub reason: FailureReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_errors::{NetworkError, StorageError};

    #[test]
    fn test_network_errors_become_transport_failures() {
        let reason = FailureReason::from(Error::from(NetworkError::HttpError {
            status: 404,
            message: "Not Found".to_string(),
        }));
        assert!(matches!(reason, FailureReason::Transport { status: 404, .. }));

        let reason = FailureReason::from(Error::from(NetworkError::ConnectionRefused(
            "refused".to_string(),
        )));
        assert!(matches!(reason, FailureReason::Transport { status: 0, .. }));
    }

    #[test]
    fn test_other_errors_become_storage_failures() {
        let reason = FailureReason::from(Error::from(StorageError::PathNotFound {
            path: "/mirror/se/rd/serde/1.0.0".to_string(),
        }));
        assert_eq!(
            reason.to_string(),
            "storage error: path not found: /mirror/se/rd/serde/1.0.0"
        );
    }

    #[test]
    fn test_mismatch_display_names_both_digests() {
        let expected = Checksum::from_data(b"expected");
        let actual = Checksum::from_data(b"actual");
        let line = FailureReason::Mismatch { expected, actual }.to_string();
        assert!(line.contains(&expected.to_hex()));
        assert!(line.contains(&actual.to_hex()));
    }
}
