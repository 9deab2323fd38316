#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for ferry
//!
//! This crate owns the HTTP client, the download URL template that maps a
//! crate version to its upstream location, and the atomic archive download.
//! Transport failures are reported, never retried here: a failed crate stays
//! out of the checkpoint and is picked up again by the next run.

mod client;
mod download;
mod template;

pub use client::{NetClient, NetConfig};
pub use download::{download_to, Download};
pub use template::{DownloadUrl, DEFAULT_TEMPLATE_SUFFIX};

use ferry_errors::{Error, NetworkError};
use url::Url;

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or uses a scheme other
/// than `http`/`https`.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(NetworkError::InvalidUrl(format!("unsupported scheme `{scheme}` in {url}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com").is_ok());
        assert!(parse_url("http://127.0.0.1:8080/crates").is_ok());
        assert!(parse_url("not a url").is_err());
        assert!(parse_url("ftp://example.com/crates").is_err());
    }
}
