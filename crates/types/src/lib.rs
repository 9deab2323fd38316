#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the ferry registry mirror
//!
//! This crate provides the identifiers shared by every stage of a mirror run.

pub mod id;

pub use id::CrateId;

use serde::{Deserialize, Serialize};

/// Which operation a mirror run performs for each crate version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Ensure the archive exists locally, downloading it if absent
    Fetch,
    /// Recompute the local archive's checksum and compare with the index
    Verify,
}

impl SyncMode {
    /// Stable lowercase name, used for checkpoint and lock file names
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Implement clap::ValueEnum for SyncMode
impl clap::ValueEnum for SyncMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Fetch, Self::Verify]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Fetch => clap::builder::PossibleValue::new("fetch"),
            Self::Verify => clap::builder::PossibleValue::new("verify"),
        })
    }
}
