//! The index root's `config.json`

use ferry_errors::{Error, IndexError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const INDEX_CONFIG_FILE: &str = "config.json";

/// Registry config published at the index root
///
/// ```json
/// {
///     "dl": "https://static.crates.io/crates/{crate}/{crate}-{version}.crate",
///     "api": "https://crates.io"
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub dl: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

impl IndexConfig {
    /// Read `config.json` from an index root; `Ok(None)` if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Option<Self>, Error> {
        let path = root.join(INDEX_CONFIG_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, path)),
        };
        let config = serde_json::from_str(&contents).map_err(|e| IndexError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(config))
    }
}
