//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("failed to build HTTP client: {0}")]
    ClientInit(String),
}

impl NetworkError {
    /// Opaque status code carried by failure outcomes.
    ///
    /// HTTP failures report their status; transport failures that never
    /// produced a response report zero.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::HttpError { status, .. } => *status,
            _ => 0,
        }
    }
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused(_) => {
                Some("Check connectivity to the upstream and re-run to retry failed crates.")
            }
            Self::InvalidUrl(_) => Some("Fix `network.download_url` or the index config.json."),
            Self::HttpError { status: 404, .. } => {
                Some("The upstream does not serve this crate version.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused(_) | Self::DownloadFailed(_) => true,
            Self::HttpError { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) | Self::ClientInit(_) => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::HttpError { .. } => "network.http_error",
            Self::ClientInit(_) => "network.client_init",
        };
        Some(code)
    }
}
