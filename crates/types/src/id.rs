//! Unit-of-work identifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one published crate version: the unit of work of a mirror run.
///
/// The textual key is `name/version`, which is also the checkpoint line format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrateId {
    pub name: String,
    pub version: String,
}

impl CrateId {
    /// Create a new crate ID
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Checkpoint key for this crate version
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let id = CrateId::new("serde", "1.0.219");
        assert_eq!(id.key(), "serde/1.0.219");
        assert_eq!(id.to_string(), id.key());
    }
}
