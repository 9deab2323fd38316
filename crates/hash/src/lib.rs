#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! SHA-256 checksums for crate archives
//!
//! The registry index records a SHA-256 digest (`cksum`) for every published
//! crate version. This crate parses those digests and recomputes them over
//! local archives for integrity verification.

use ferry_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum {
    bytes: [u8; 32],
}

impl Checksum {
    /// Create a checksum from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to lowercase hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string
    ///
    /// Upper- and lowercase digits are both accepted, so two checksums compare
    /// equal regardless of the case they were written in.
    ///
    /// # Errors
    /// Returns an error if the input string is not valid hexadecimal or is not exactly 64 characters (32 bytes).
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s.trim()).map_err(|e| StorageError::CorruptedData {
            message: format!("invalid hex: {e}"),
        })?;

        let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            StorageError::CorruptedData {
                message: format!("checksum must be 32 bytes, got {}", bytes.len()),
            }
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Compute checksum of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        Self::from_bytes(Sha256::digest(data).into())
    }

    /// Compute checksum of a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, read, or if any I/O operation fails.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self::from_bytes(hasher.finalize().into()))
    }
}

/// Incremental checksum over data that arrives in chunks
#[derive(Debug, Clone, Default)]
pub struct StreamingChecksum {
    hasher: Sha256,
    len: u64,
}

impl StreamingChecksum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn finalize(self) -> Checksum {
        Checksum::from_bytes(self.hasher.finalize().into())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Verify a file matches an expected checksum
///
/// Returns the checksum actually computed so callers can report both sides
/// of a mismatch.
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Checksum) -> Result<(bool, Checksum), Error> {
    let actual = Checksum::hash_file(path).await?;
    Ok((actual == *expected, actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_checksum_basics() {
        let checksum = Checksum::from_data(b"hello world");

        // Known SHA-256 of "hello world"
        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(checksum.to_hex(), expected);
    }

    #[test]
    fn test_hex_is_case_insensitive() {
        let lower = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let upper = lower.to_uppercase();
        assert_eq!(
            Checksum::from_hex(lower).unwrap(),
            Checksum::from_hex(&upper).unwrap()
        );
        assert_eq!(Checksum::from_data(b"abc").to_hex(), lower);
    }

    #[test]
    fn test_checksum_serialization() {
        let checksum = Checksum::from_data(b"test");
        let json = serde_json::to_string(&checksum).unwrap();
        let deserialized: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(checksum, deserialized);
    }

    #[tokio::test]
    async fn test_hash_file() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"test file content";
        temp.write_all(data).unwrap();

        let checksum = Checksum::hash_file(temp.path()).await.unwrap();
        assert_eq!(checksum, Checksum::from_data(data));
    }

    #[test]
    fn test_streaming_matches_oneshot() {
        let mut streaming = StreamingChecksum::new();
        streaming.update(b"hello ");
        streaming.update(b"world");
        assert_eq!(streaming.len(), 11);
        assert_eq!(streaming.finalize(), Checksum::from_data(b"hello world"));
    }
}
