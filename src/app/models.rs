//! Wire models shared by the transport
//!
//! The generic error envelope, the no-content sentinel, and the bodies exchanged with
//! the credential endpoints. Resource-specific DTOs belong to callers.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Structured error envelope returned by the server on failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// One entry of the envelope's sub-error list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FieldErrorMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ServerMessage {
    /// Create an envelope carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            reason: None,
            error: None,
            errors: Vec::new(),
        }
    }

    /// Attach an HTTP status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Synthesize an envelope from a status code's standard reason phrase
    pub fn from_status(status: StatusCode) -> Self {
        let message = status
            .canonical_reason()
            .map(|reason| reason.to_lowercase())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Self::new(message).with_status(status.as_u16())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result shape for endpoints that must answer with an empty body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoContent;

/// Terms that were previously accepted and have since changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedTerms {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// JSON body of the refresh-token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub username: String,
    pub refresh: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_country: Option<String>,
}

impl RefreshRequest {
    pub fn new(username: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            refresh: refresh.into(),
            token: "true".to_string(),
            client_id: None,
            client_secret: None,
            accept: None,
            billing_country: None,
        }
    }
}

/// Response of the refresh-token exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    /// Absolute expiry, milliseconds since the epoch
    #[serde(default)]
    pub token_exp: Option<i64>,
    /// Relative expiry in seconds, possibly fractional; preferred over `token_exp`
    #[serde(default)]
    pub expires_in: Option<f64>,
    #[serde(default)]
    pub updated_terms: Option<Vec<UpdatedTerms>>,
}

/// Extra options for an explicit refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Refresh as this user instead of the credential's owner
    pub username: Option<String>,
    /// Use this refresh token instead of the credential's
    pub refresh_token: Option<String>,
    /// Terms identifiers accepted with this refresh
    pub accept: Option<Vec<String>>,
    pub billing_country: Option<String>,
}
