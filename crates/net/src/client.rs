//! HTTP client with connection pooling

use ferry_config::NetworkConfig;
use ferry_errors::{Error, NetworkError};
use reqwest::{Client, Response};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // crate archives can be large
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 64,
            user_agent: format!("ferry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetConfig {
    /// Build client settings from the `[network]` config section
    #[must_use]
    pub fn from_config(config: &NetworkConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(config.timeout),
            connect_timeout: Duration::from_secs(config.connect_timeout),
            user_agent: config.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }
}

/// HTTP client wrapper
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone, Debug)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ClientInit(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Execute a GET request and require a success status
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::HttpError` for non-2xx responses and a transport
    /// error variant when no response was received.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            }
            .into());
        }
        Ok(response)
    }

    /// Get the underlying reqwest client for advanced usage
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

pub(crate) fn map_reqwest_error(url: &str, error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        NetworkError::ConnectionRefused(error.to_string())
    } else if let Some(status) = error.status() {
        NetworkError::HttpError {
            status: status.as_u16(),
            message: error.to_string(),
        }
    } else {
        NetworkError::DownloadFailed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let network = NetworkConfig {
            download_url: None,
            timeout: 12,
            connect_timeout: 3,
            user_agent: Some("mirror-bot/1.0".to_string()),
        };
        let config = NetConfig::from_config(&network);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "mirror-bot/1.0");
        assert_eq!(config.pool_max_idle_per_host, 64);
    }

    #[test]
    fn test_default_user_agent() {
        let config = NetConfig::default();
        assert!(config.user_agent.starts_with("ferry/"));
    }
}
