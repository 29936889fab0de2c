//! Application constants for the REST transport
//!
//! This module centralizes the constants used throughout the crate,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names consulted when loading configuration
pub mod env {
    /// Base URL of the remote API
    pub const BASE_URL: &str = "REST_TRANSPORT_BASE_URL";

    /// API client identifier
    pub const CLIENT_ID: &str = "REST_TRANSPORT_CLIENT_ID";

    /// API client secret
    pub const CLIENT_SECRET: &str = "REST_TRANSPORT_CLIENT_SECRET";

    /// User agent override
    pub const USER_AGENT: &str = "REST_TRANSPORT_USER_AGENT";
}

/// Credential and refresh constants
pub mod auth {
    /// A refreshable credential within this many milliseconds of expiry is refreshed
    /// before the next authenticated request is sent.
    pub const REFRESH_THRESHOLD_MS: i64 = 30_000;

    /// Endpoint used for the refresh-token exchange
    pub const REFRESH_PATH: &str = "/rest/auth/refresh";

    /// Endpoint used for the password grant
    pub const ACCESS_TOKEN_PATH: &str = "/rest/oauth/access_token";

    /// Redirect URI sent with the password grant
    pub const DEFAULT_REDIRECT_URI: &str = "https://localhost";

    /// File permissions for the persisted credential (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const CREDENTIAL_FILE_PERMISSIONS: u32 = 0o600;

    /// File name of the persisted credential inside the config directory
    pub const CREDENTIAL_FILE_NAME: &str = "credential.json";

    /// Number of token characters that may appear in logs
    pub const LOGGED_TOKEN_PREFIX: usize = 8;
}

/// Header names set by the request decorator
pub mod headers {
    /// Bearer token header
    pub const AUTHORIZATION: &str = "Authorization";

    /// API client identifier header
    pub const API_KEY: &str = "Api-Key";

    /// API client secret header (home host only)
    pub const API_KEY_SECRET: &str = "Api-Key-Secret";

    /// User agent override header
    pub const USER_AGENT: &str = "User-Agent";

    /// Legacy compatibility header (home host only)
    pub const NO_DECORATE: &str = "tp-nodecorate";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent when none is configured
    pub const USER_AGENT: &str = concat!("rest-transport/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Task queue ceilings
pub mod queues {
    /// Interactive (data) requests in flight at once
    pub const INTERACTIVE_CONCURRENCY: usize = 4;

    /// Uploads are strictly serialized
    pub const UPLOAD_CONCURRENCY: usize = 1;

    /// Downloads are strictly serialized
    pub const DOWNLOAD_CONCURRENCY: usize = 1;
}

/// File staging constants
pub mod files {
    /// Name of the cache subdirectory used by this crate
    pub const CACHE_NAMESPACE: &str = "rest-transport";

    /// Subdirectory for staged multipart uploads
    pub const UPLOADS_DIR: &str = "uploads";

    /// Subdirectory for relocated downloads
    pub const DOWNLOADS_DIR: &str = "downloads";

    /// Extension of staged multipart payloads
    pub const MULTIPART_EXTENSION: &str = "multipart";

    /// Fallback name for downloads without a usable file name
    pub const DEFAULT_DOWNLOAD_NAME: &str = "download";

    /// Length of the random multipart boundary suffix
    pub const BOUNDARY_LENGTH: usize = 24;
}

/// Event channel sizing
pub mod events {
    /// Capacity of the broadcast channel carrying transport events
    pub const CHANNEL_CAPACITY: usize = 64;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Target used for request/response body diagnostics
    pub const DIAGNOSTICS_TARGET: &str = "rest_transport::diagnostics";
}

// Re-export commonly used constants for convenience
pub use auth::REFRESH_THRESHOLD_MS;
pub use http::USER_AGENT;
pub use queues::{DOWNLOAD_CONCURRENCY, INTERACTIVE_CONCURRENCY, UPLOAD_CONCURRENCY};
