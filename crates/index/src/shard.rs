//! Shard path resolution
//!
//! The layout is fixed by the registry index format:
//!
//! | name length | path |
//! |---|---|
//! | 1 | `1/{name}` |
//! | 2 | `2/{name}` |
//! | 3 | `3/{name[0]}/{name}` |
//! | 4+ | `{name[0..2]}/{name[2..4]}/{name}` |
//!
//! Names are lowercased before sharding.

use ferry_errors::IndexError;
use ferry_types::CrateId;
use std::path::{Path, PathBuf};

/// Reject names that cannot safely become a path component
///
/// # Errors
///
/// Returns `IndexError::InvalidName` for empty names, names containing a path
/// separator, and `.`/`..`.
pub fn validate_name(name: &str) -> Result<(), IndexError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(IndexError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Relative shard path of a crate name, `/`-separated
///
/// # Errors
///
/// Returns `IndexError::InvalidName` if the name fails [`validate_name`].
pub fn shard_path(name: &str) -> Result<String, IndexError> {
    validate_name(name)?;
    let name = name.to_lowercase();
    let prefix = prefix_of(&name);
    Ok(format!("{prefix}/{name}"))
}

/// Directory part of the shard path, as used by `{prefix}` in download templates
///
/// `lower` selects `{lowerprefix}` semantics; otherwise the original case is kept.
///
/// # Errors
///
/// Returns `IndexError::InvalidName` if the name fails [`validate_name`].
pub fn shard_prefix(name: &str, lower: bool) -> Result<String, IndexError> {
    validate_name(name)?;
    if lower {
        Ok(prefix_of(&name.to_lowercase()))
    } else {
        Ok(prefix_of(name))
    }
}

/// Location of a mirrored archive: `root / shard_path(name) / version`
///
/// # Errors
///
/// Returns `IndexError::InvalidName` if either the name or the version is not a
/// safe path component.
pub fn archive_path(root: &Path, id: &CrateId) -> Result<PathBuf, IndexError> {
    validate_name(&id.version)?;
    let mut path = root.to_path_buf();
    for component in shard_path(&id.name)?.split('/') {
        path.push(component);
    }
    path.push(&id.version);
    Ok(path)
}

fn prefix_of(name: &str) -> String {
    let mut chars = name.chars();
    match name.chars().count() {
        1 => "1".to_string(),
        2 => "2".to_string(),
        3 => format!("3/{}", chars.next().unwrap_or_default()),
        _ => {
            let first: String = chars.by_ref().take(2).collect();
            let second: String = chars.take(2).collect();
            format!("{first}/{second}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_path_rules() {
        assert_eq!(shard_path("a").unwrap(), "1/a");
        assert_eq!(shard_path("ab").unwrap(), "2/ab");
        assert_eq!(shard_path("abc").unwrap(), "3/a/abc");
        assert_eq!(shard_path("cargo").unwrap(), "ca/rg/cargo");
        assert_eq!(shard_path("serd").unwrap(), "se/rd/serd");
    }

    #[test]
    fn test_shard_path_lowercases() {
        assert_eq!(shard_path("Cargo").unwrap(), shard_path("cargo").unwrap());
        assert_eq!(shard_path("ABC").unwrap(), "3/a/abc");
    }

    #[test]
    fn test_prefix_keeps_case_unless_lower() {
        assert_eq!(shard_prefix("Cargo", false).unwrap(), "Ca/rg");
        assert_eq!(shard_prefix("Cargo", true).unwrap(), "ca/rg");
        assert_eq!(shard_prefix("X", false).unwrap(), "1");
        assert_eq!(shard_prefix("Xyz", false).unwrap(), "3/X");
    }

    #[test]
    fn test_invalid_names() {
        assert!(shard_path("").is_err());
        assert!(shard_path("..").is_err());
        assert!(shard_path("a/b").is_err());
        assert!(shard_path("a\\b").is_err());
    }

    #[test]
    fn test_archive_path() {
        let path = archive_path(Path::new("/srv/crates"), &CrateId::new("Serde", "1.0.0")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/crates/se/rd/serde/1.0.0"));

        assert!(archive_path(Path::new("/srv"), &CrateId::new("serde", "../x")).is_err());
    }
}
