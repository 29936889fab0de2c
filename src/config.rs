//! Configuration management for the REST transport
//!
//! This module provides layered configuration loading: defaults, then a TOML file,
//! then environment variables. Command-line flags are applied by the binary last.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::{ClientConfig, ClientSettings, StagingDirs};
use crate::constants::{env as env_constants, files, http, logging, queues};
use crate::errors::{ConfigError, ConfigResult, TransportResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote API identity settings
    pub client: ClientSection,
    /// HTTP connection settings
    pub http: HttpSection,
    /// Task queue ceilings
    pub queues: QueueConfig,
    /// Staging directories
    pub cache: CacheSection,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote API identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Base URL of the remote API (required before any request)
    pub base_url: Option<String>,
    /// API client identifier
    pub client_id: Option<String>,
    /// API client secret
    pub client_secret: Option<String>,
    /// User agent override
    pub user_agent: Option<String>,
    /// Log request and response bodies
    pub debug_logging: bool,
}

/// TOML-friendly HTTP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Request timeout, e.g. "60s"
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout, e.g. "30s"
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Connection pool idle timeout (None = keep forever)
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            tcp_nodelay: true,
        }
    }
}

/// Concurrency ceilings, read once when the client is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub interactive_concurrency: usize,
    pub upload_concurrency: usize,
    pub download_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interactive_concurrency: queues::INTERACTIVE_CONCURRENCY,
            upload_concurrency: queues::UPLOAD_CONCURRENCY,
            download_concurrency: queues::DOWNLOAD_CONCURRENCY,
        }
    }
}

/// Staging directory configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Root for `uploads/` and `downloads/` (None = platform cache directory)
    pub cache_root: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, or the default location if it exists)
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if an explicit file does not exist, or a parse
    /// error if the file is not valid TOML.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            debug!("Loading config from: {}", path.display());
            config = Self::load_from_file(&path).await?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::CACHE_NAMESPACE).join("config.toml"))
    }

    fn find_config_file() -> Option<PathBuf> {
        let path = Self::default_config_path()?;
        if path.exists() {
            debug!("Found config file: {}", path.display());
            Some(path)
        } else {
            debug!("No config file found in standard locations");
            None
        }
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override client identity from `REST_TRANSPORT_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        let read = |name: &str| env::var(name).ok().filter(|value| !value.is_empty());

        if let Some(base_url) = read(env_constants::BASE_URL) {
            self.client.base_url = Some(base_url);
        }
        if let Some(client_id) = read(env_constants::CLIENT_ID) {
            self.client.client_id = Some(client_id);
        }
        if let Some(client_secret) = read(env_constants::CLIENT_SECRET) {
            self.client.client_secret = Some(client_secret);
        }
        if let Some(user_agent) = read(env_constants::USER_AGENT) {
            self.client.user_agent = Some(user_agent);
        }
    }

    /// Check every setting and report all problems at once
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Some(base_url) = &self.client.base_url {
            if let Err(e) = Url::parse(base_url) {
                errors.push(format!("client.base_url '{}' is not a valid URL: {}", base_url, e));
            }
        }

        for (name, value) in [
            ("queues.interactive_concurrency", self.queues.interactive_concurrency),
            ("queues.upload_concurrency", self.queues.upload_concurrency),
            ("queues.download_concurrency", self.queues.download_concurrency),
        ] {
            if value == 0 {
                errors.push(format!("{} must be at least 1", name));
            }
        }

        if self.http.request_timeout.is_zero() {
            errors.push("http.request_timeout must be greater than zero".to_string());
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            errors.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(
        &self,
    ) -> TransportResult<(ClientSettings, ClientConfig, StagingDirs)> {
        Ok((
            self.client.to_runtime_config()?,
            self.http.to_runtime_config(),
            self.cache.to_runtime_config(),
        ))
    }
}

impl ClientSection {
    /// Convert to runtime ClientSettings
    pub fn to_runtime_config(&self) -> TransportResult<ClientSettings> {
        let mut settings = match &self.base_url {
            Some(base_url) => ClientSettings::new(base_url)?,
            None => ClientSettings::default(),
        };
        settings.client_id = self.client_id.clone();
        settings.client_secret = self.client_secret.clone();
        settings.user_agent = self.user_agent.clone();
        settings.debug_logging = self.debug_logging;
        Ok(settings)
    }
}

impl HttpSection {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
            tcp_nodelay: self.tcp_nodelay,
            ..ClientConfig::default()
        }
    }
}

impl CacheSection {
    /// Convert to runtime StagingDirs
    pub fn to_runtime_config(&self) -> StagingDirs {
        match &self.cache_root {
            Some(root) => StagingDirs::under(root),
            None => StagingDirs::platform_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(config.queues.interactive_concurrency, 4);
        assert_eq!(config.queues.upload_concurrency, 1);
        assert_eq!(config.queues.download_concurrency, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.client.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        // Should fail when explicitly specified
        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let test_config = r#"
[client]
base_url = "https://api.example.com"
client_id = "app"
debug_logging = true

[http]
request_timeout = "15s"
pool_idle_timeout = "2m"

[queues]
interactive_concurrency = 8

[cache]
cache_root = "/tmp/rest-transport-test"

[logging]
level = "debug"
"#;

        tokio::fs::write(&config_path, test_config).await.unwrap();
        let config = AppConfig::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.client.base_url.as_deref(), Some("https://api.example.com"));
        assert!(config.client.debug_logging);
        assert_eq!(config.http.request_timeout, Duration::from_secs(15));
        assert_eq!(config.http.pool_idle_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.queues.interactive_concurrency, 8);
        assert_eq!(config.logging.level, "debug");

        // Defaults are still present for unspecified values
        assert_eq!(config.queues.upload_concurrency, 1);
        assert_eq!(config.http.connect_timeout, http::CONNECT_TIMEOUT);

        let (settings, client, staging) = config.to_runtime_config().unwrap();
        assert!(settings.is_configured(false));
        assert_eq!(client.request_timeout, Duration::from_secs(15));
        assert_eq!(
            staging.uploads,
            PathBuf::from("/tmp/rest-transport-test/uploads")
        );
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[queues\ninteractive = ").await.unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let mut config = AppConfig::default();
        config.client.base_url = Some("::not a url".to_string());
        config.queues.upload_concurrency = 0;
        config.queues.download_concurrency = 0;
        config.logging.level = "loud".to_string();

        match config.validate() {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 4),
            other => panic!("Expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[queues]"));
        assert!(text.contains("request_timeout = \"1m\""));

        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
