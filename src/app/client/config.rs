//! HTTP client configuration and building logic
//!
//! This module holds the runtime settings consumed by the transport: the connection
//! tuning used to build the `reqwest` client, the identity of the calling application,
//! and the cache directories used for upload and download staging.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{files, http};
use crate::errors::{TransportError, TransportResult};

/// Configuration for HTTP client connection handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Enable HTTP/2 adaptive window
    pub http2: bool,
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http2: false,
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> TransportResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if self.http2 {
            client_builder = client_builder.http2_adaptive_window(true);
        }

        // Configure TCP keep-alive if specified
        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        // Configure connection pool idle timeout
        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder
            .build()
            .map_err(|e| TransportError::invalid_configuration(format!("HTTP client: {}", e)))
    }
}

/// Identity and behaviour settings of the calling application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    /// Root of all home-host endpoints
    pub base_url: Option<Url>,
    /// Sent as `Api-Key` on home-host requests
    pub client_id: Option<String>,
    /// Sent as `Api-Key-Secret` on home-host requests
    pub client_secret: Option<String>,
    /// Overrides the default user agent when set and non-empty
    pub user_agent: Option<String>,
    /// Log request and response bodies on the diagnostics target
    pub debug_logging: bool,
}

impl ClientSettings {
    /// Settings for a base URL
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the URL does not parse.
    pub fn new(base_url: &str) -> TransportResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::invalid_configuration(format!("invalid base URL {}: {}", base_url, e))
        })?;
        Ok(Self {
            base_url: Some(base_url),
            ..Self::default()
        })
    }

    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: Option<impl Into<String>>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret.map(Into::into);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Configured once a base URL exists and the caller can identify itself,
    /// either with a credential or a client identifier
    pub fn is_configured(&self, has_credential: bool) -> bool {
        self.base_url.is_some() && (has_credential || self.client_id.is_some())
    }
}

/// Cache directories for multipart staging and relocated downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDirs {
    pub uploads: PathBuf,
    pub downloads: PathBuf,
}

impl StagingDirs {
    /// `uploads/` and `downloads/` under the given root
    pub fn under(root: &Path) -> Self {
        Self {
            uploads: root.join(files::UPLOADS_DIR),
            downloads: root.join(files::DOWNLOADS_DIR),
        }
    }

    /// Under the platform cache directory, falling back to the system temp directory
    pub fn platform_default() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(files::CACHE_NAMESPACE);
        Self::under(&root)
    }
}

impl Default for StagingDirs {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(!config.http2);
        assert!(config.tcp_nodelay);
        assert_eq!(config.request_timeout, http::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_http_client_creation() {
        // Test that HTTP client can be created with default and custom config
        assert!(ClientConfig::default().build_http_client().is_ok());

        let config = ClientConfig {
            http2: true,
            request_timeout: Duration::from_secs(5),
            tcp_keepalive: None,
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_is_configured_requires_base_url_and_identity() {
        let bare = ClientSettings::default();
        assert!(!bare.is_configured(true));

        let settings = ClientSettings::new("https://api.example.com").unwrap();
        assert!(!settings.is_configured(false));
        assert!(settings.is_configured(true));

        let with_client = settings.with_client("id", None::<String>);
        assert!(with_client.is_configured(false));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            ClientSettings::new("not a url"),
            Err(TransportError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_staging_dirs_layout() {
        let dirs = StagingDirs::under(Path::new("/tmp/cache"));
        assert_eq!(dirs.uploads, PathBuf::from("/tmp/cache/uploads"));
        assert_eq!(dirs.downloads, PathBuf::from("/tmp/cache/downloads"));
    }
}
