//! Index data models

use ferry_hash::Checksum;
use ferry_types::CrateId;
use serde::Deserialize;

/// Wire shape of one shard line; extra fields (deps, features, ...) are ignored
#[derive(Debug, Deserialize)]
struct IndexLine {
    name: String,
    vers: String,
    cksum: String,
    #[serde(default)]
    yanked: bool,
}

/// One published crate version, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub name: String,
    pub version: String,
    pub checksum: Checksum,
    pub yanked: bool,
}

impl VersionRecord {
    /// Parse one JSON line of a shard file
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the line is not JSON, lacks a
    /// required field, or carries a checksum that is not 64 hex digits.
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let raw: IndexLine = serde_json::from_str(line).map_err(|e| e.to_string())?;
        if raw.name.is_empty() || raw.vers.is_empty() {
            return Err("empty name or version".to_string());
        }
        let checksum = Checksum::from_hex(&raw.cksum).map_err(|e| format!("cksum: {e}"))?;
        Ok(Self {
            name: raw.name,
            version: raw.vers,
            checksum,
            yanked: raw.yanked,
        })
    }

    /// The unit-of-work identifier for this version
    #[must_use]
    pub fn id(&self) -> CrateId {
        CrateId::new(self.name.clone(), self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CKSUM: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_parse_full_line() {
        let line = format!(
            r#"{{"name":"cargo","vers":"0.1.0","deps":[],"cksum":"{CKSUM}","features":{{}},"yanked":true}}"#
        );
        let record = VersionRecord::parse_line(&line).unwrap();
        assert_eq!(record.id(), CrateId::new("cargo", "0.1.0"));
        assert_eq!(record.checksum.to_hex(), CKSUM);
        assert!(record.yanked);
    }

    #[test]
    fn test_yanked_defaults_false() {
        let line = format!(r#"{{"name":"a","vers":"1.0.0","cksum":"{CKSUM}"}}"#);
        assert!(!VersionRecord::parse_line(&line).unwrap().yanked);
    }

    #[test]
    fn test_bad_lines() {
        assert!(VersionRecord::parse_line("not json").is_err());
        assert!(VersionRecord::parse_line(r#"{"name":"a","vers":"1.0.0"}"#).is_err());
        assert!(
            VersionRecord::parse_line(r#"{"name":"a","vers":"1.0.0","cksum":"abc"}"#).is_err()
        );
    }
}
