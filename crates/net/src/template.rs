//! Download URL templates
//!
//! Same marker syntax as the `dl` field of a registry index `config.json`.

use ferry_errors::{Error, NetworkError};
use ferry_index::shard_prefix;
use ferry_types::CrateId;

const CRATE_MARKER: &str = "{crate}";
const VERSION_MARKER: &str = "{version}";
const PREFIX_MARKER: &str = "{prefix}";
const LOWER_PREFIX_MARKER: &str = "{lowerprefix}";

/// Appended to templates that carry no marker at all
pub const DEFAULT_TEMPLATE_SUFFIX: &str = "/{crate}/{version}/download";

/// A validated download URL template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUrl {
    template: String,
}

impl DownloadUrl {
    /// Parse a template, appending the default suffix when it has no markers
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidUrl` if the template does not produce an
    /// absolute http(s) URL.
    pub fn new(template: &str) -> Result<Self, Error> {
        let template = template.trim();
        let has_marker = [CRATE_MARKER, VERSION_MARKER, PREFIX_MARKER, LOWER_PREFIX_MARKER]
            .iter()
            .any(|marker| template.contains(marker));

        let template = if has_marker {
            template.to_string()
        } else {
            format!("{}{DEFAULT_TEMPLATE_SUFFIX}", template.trim_end_matches('/'))
        };

        let probe = template
            .replace(CRATE_MARKER, "probe")
            .replace(VERSION_MARKER, "0.0.0")
            .replace(LOWER_PREFIX_MARKER, "pr/ob")
            .replace(PREFIX_MARKER, "pr/ob");
        crate::parse_url(&probe)?;

        Ok(Self { template })
    }

    /// The effective template, after suffixing
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Concrete URL of one crate version
    ///
    /// # Errors
    ///
    /// Returns an error if the crate name cannot be sharded.
    pub fn resolve(&self, id: &CrateId) -> Result<String, Error> {
        let mut url = self
            .template
            .replace(CRATE_MARKER, &id.name)
            .replace(VERSION_MARKER, &id.version);
        if url.contains(LOWER_PREFIX_MARKER) {
            url = url.replace(LOWER_PREFIX_MARKER, &shard_prefix(&id.name, true)?);
        }
        if url.contains(PREFIX_MARKER) {
            url = url.replace(PREFIX_MARKER, &shard_prefix(&id.name, false)?);
        }
        if url.contains(' ') {
            return Err(NetworkError::InvalidUrl(url).into());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_template_gets_suffix() {
        let url = DownloadUrl::new("https://crates.io/api/v1/crates/").unwrap();
        assert_eq!(
            url.template(),
            "https://crates.io/api/v1/crates/{crate}/{version}/download"
        );
        assert_eq!(
            url.resolve(&CrateId::new("serde", "1.0.0")).unwrap(),
            "https://crates.io/api/v1/crates/serde/1.0.0/download"
        );
    }

    #[test]
    fn test_prefix_markers() {
        let url =
            DownloadUrl::new("https://mirror.example/{prefix}/{lowerprefix}/{crate}-{version}.crate")
                .unwrap();
        assert_eq!(
            url.resolve(&CrateId::new("Inflector", "0.11.4")).unwrap(),
            "https://mirror.example/In/fl/in/fl/Inflector-0.11.4.crate"
        );
        assert_eq!(
            url.resolve(&CrateId::new("syn", "2.0.0")).unwrap(),
            "https://mirror.example/3/s/3/s/syn-2.0.0.crate"
        );
    }

    #[test]
    fn test_invalid_template() {
        assert!(DownloadUrl::new("not a url").is_err());
        assert!(DownloadUrl::new("file:///srv/crates").is_err());
    }
}
