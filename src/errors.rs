//! Error types for the REST transport
//!
//! This module defines the error types for all components of the crate. Every request
//! submitted to the transport terminates in exactly one `TransportResult`, and the
//! classification into the variants below happens inside the transport, never in callers.

use std::path::PathBuf;
use thiserror::Error;

use crate::app::models::ServerMessage;

/// Terminal failure of a single transport request
#[derive(Error, Debug)]
pub enum TransportError {
    /// Base URL missing, or an authenticated call attempted before configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// The descriptor carries a body its method cannot send
    #[error("Unexpected request body for {method} request")]
    UnexpectedRequestBody { method: String },

    /// The descriptor lacks a body its method requires
    #[error("Missing request body for {method} request")]
    MissingRequestBody { method: String },

    /// Local serialization or multipart staging failed
    #[error("Failed to encode request body: {reason}")]
    FailedEncodingRequestBody { reason: String },

    /// The server answered with an error envelope (or one was synthesized from the status)
    #[error("Server error: {0}")]
    ServerError(ServerMessage),

    /// The server answered successfully but the body matched no expected shape
    #[error("Failed to decode response")]
    FailedDecodingResponse(#[source] DecodeFailure),

    /// Network-layer failure: timeout, connectivity, TLS or cancellation
    #[error("Transport failure")]
    TransportFailure(#[source] NetworkFailure),
}

/// Reasons a successful response could not be decoded
#[derive(Error, Debug)]
pub enum DecodeFailure {
    /// The body was not valid JSON for the requested shape
    #[error("JSON decoding error")]
    Json(#[from] serde_json::Error),

    /// A body was present where none was expected
    #[error("Expected an empty body, received {len} bytes")]
    UnexpectedContent { len: usize },

    /// A download reported success but produced no usable file
    #[error("Download completed without producing a resource")]
    MissingResource,
}

/// Network-layer failures
#[derive(Error, Debug)]
pub enum NetworkFailure {
    /// HTTP request error from the underlying client
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Local I/O error while streaming a body
    #[error("I/O error during transfer")]
    Io(#[from] std::io::Error),

    /// The request was cancelled through its handle
    #[error("Request was cancelled")]
    Cancelled,

    /// The owning client was dropped before the request could be dispatched
    #[error("Transport client is no longer available")]
    Disconnected,
}

/// Credential persistence errors
#[derive(Error, Debug)]
pub enum CredentialStoreError {
    /// No credential has been saved yet
    #[error("No stored credential at {path}. Run 'login' first")]
    NotFound { path: PathBuf },

    /// File I/O error during credential storage
    #[error("Failed to access credential file")]
    Io(#[from] std::io::Error),

    /// The credential file is not valid JSON
    #[error("Credential file is corrupted")]
    Json(#[from] serde_json::Error),

    /// Permission error on credential file
    #[error("Permission denied accessing credential file: {path}")]
    PermissionDenied { path: PathBuf },

    /// No platform directory could be determined for the credential file
    #[error("Could not determine a configuration directory for the credential file")]
    NoConfigDirectory,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// I/O error reading or writing configuration
    #[error("I/O error accessing configuration")]
    Io(#[from] std::io::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Credential store error
    #[error(transparent)]
    CredentialStore(#[from] CredentialStoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl TransportError {
    /// Build an invalid-configuration error
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Build a body-encoding error
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::FailedEncodingRequestBody {
            reason: reason.into(),
        }
    }

    /// The request was cancelled before or during dispatch
    pub fn cancelled() -> Self {
        Self::TransportFailure(NetworkFailure::Cancelled)
    }

    /// Check whether this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::TransportFailure(NetworkFailure::Cancelled))
    }

    /// The server envelope, when this is a server error
    pub fn server_message(&self) -> Option<&ServerMessage> {
        match self {
            Self::ServerError(message) => Some(message),
            _ => None,
        }
    }

    /// HTTP status carried by a server error, if any
    pub fn status_code(&self) -> Option<u16> {
        self.server_message().and_then(|message| message.status_code)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::TransportFailure(NetworkFailure::Http(error))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        Self::TransportFailure(NetworkFailure::Io(error))
    }
}

impl From<DecodeFailure> for TransportError {
    fn from(failure: DecodeFailure) -> Self {
        Self::FailedDecodingResponse(failure)
    }
}

impl From<NetworkFailure> for TransportError {
    fn from(failure: NetworkFailure) -> Self {
        Self::TransportFailure(failure)
    }
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transport(TransportError::TransportFailure(NetworkFailure::Http(_)))
            | AppError::Transport(TransportError::TransportFailure(NetworkFailure::Io(_))) => true,

            AppError::Transport(TransportError::ServerError(message)) => {
                matches!(message.status_code, Some(code) if code >= 500)
            }

            AppError::Transport(TransportError::InvalidConfiguration { .. })
            | AppError::Transport(TransportError::FailedDecodingResponse(_))
            | AppError::Config(ConfigError::InvalidFormat(_)) => false,

            _ => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Transport(TransportError::ServerError(_)) => "server",
            AppError::Transport(TransportError::FailedDecodingResponse(_)) => "decoding",
            AppError::Transport(TransportError::TransportFailure(_)) => "network",
            AppError::Transport(_) => "request",
            AppError::CredentialStore(_) => "credentials",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transport result type alias
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Credential store result type alias
pub type StoreResult<T> = std::result::Result<T, CredentialStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_report_status() {
        let error = TransportError::ServerError(ServerMessage::new("boom").with_status(503));
        assert_eq!(error.status_code(), Some(503));
        assert_eq!(error.to_string(), "Server error: boom");

        let app: AppError = error.into();
        assert!(app.is_recoverable());
        assert_eq!(app.category(), "server");
    }

    #[test]
    fn test_client_errors_are_not_recoverable() {
        let app: AppError =
            TransportError::ServerError(ServerMessage::new("nope").with_status(404)).into();
        assert!(!app.is_recoverable());

        let app: AppError = TransportError::invalid_configuration("no base url").into();
        assert!(!app.is_recoverable());
        assert_eq!(app.category(), "request");
    }

    #[test]
    fn test_cancellation_is_detected() {
        assert!(TransportError::cancelled().is_cancelled());
        assert!(!TransportError::encoding("disk full").is_cancelled());
        let app: AppError = TransportError::cancelled().into();
        assert_eq!(app.category(), "network");
    }
}
