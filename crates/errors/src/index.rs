//! Registry index error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum IndexError {
    #[error("malformed record at {path}:{line}: {message}")]
    MalformedRecord {
        path: String,
        line: usize,
        message: String,
    },

    #[error("cannot read shard {path}: {message}")]
    UnreadableShard { path: String, message: String },

    #[error("invalid crate name: {name:?}")]
    InvalidName { name: String },

    #[error("index root not found: {path}")]
    RootNotFound { path: String },

    #[error("invalid index config {path}: {message}")]
    InvalidConfig { path: String, message: String },
}

impl UserFacingError for IndexError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RootNotFound { .. } => {
                Some("Point `paths.index` at a checkout of the registry index.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MalformedRecord { .. } => "index.malformed_record",
            Self::UnreadableShard { .. } => "index.unreadable_shard",
            Self::InvalidName { .. } => "index.invalid_name",
            Self::RootNotFound { .. } => "index.root_not_found",
            Self::InvalidConfig { .. } => "index.invalid_config",
        };
        Some(code)
    }
}
