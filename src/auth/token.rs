//! Credential model and expiry bookkeeping
//!
//! A `Credential` is an access/refresh token pair. It is created by a login or token
//! exchange, replaced wholesale on every successful refresh, and cleared on logout.
//! Equality is field-by-field and decides whether observers hear about a change.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::app::models::TokenResponse;
use crate::constants::auth;

/// Bearer credential with optional refresh token and expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CredentialWire")]
pub struct Credential {
    /// Bearer value attached to authenticated requests
    pub access_token: String,
    /// Absent means the credential can never be refreshed automatically
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as milliseconds since the Unix epoch
    #[serde(rename = "token_exp", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Username the credential was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Accepted on input: the OAuth token shape plus the persisted fields.
/// A relative `expires_in` wins over an absolute `token_exp`.
#[derive(Deserialize)]
struct CredentialWire {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_exp: Option<i64>,
    #[serde(default)]
    expires_in: Option<f64>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl From<CredentialWire> for Credential {
    fn from(wire: CredentialWire) -> Self {
        let expires_at = match wire.expires_in {
            Some(seconds) => Some(expiry_after(now_millis(), seconds)),
            None => wire.token_exp,
        };

        Self {
            access_token: wire.access_token,
            refresh_token: wire.refresh_token,
            expires_at,
            username: wire.username,
            scope: wire.scope,
            token_type: wire.token_type,
        }
    }
}

impl Credential {
    /// Create a non-refreshable credential from a bearer value
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            username: None,
            scope: None,
            token_type: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expires_at_millis: i64) -> Self {
        self.expires_at = Some(expires_at_millis);
        self
    }

    /// Set the expiry relative to now
    pub fn expiring_in(self, seconds: i64) -> Self {
        self.with_expiry(now_millis().saturating_add(seconds.saturating_mul(1000)))
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Build the replacement credential from a refresh response.
    ///
    /// The relative `expiresIn` takes precedence over the absolute `tokenExp` because it
    /// is immune to clock skew between client and server. The replacement keeps the
    /// username that performed the refresh.
    pub fn from_token_response(response: &TokenResponse, username: &str, now: i64) -> Self {
        let expires_at = match response.expires_in {
            Some(seconds) => Some(expiry_after(now, seconds)),
            None => response.token_exp,
        };

        Self {
            access_token: response.token.clone().unwrap_or_default(),
            refresh_token: response.refresh.clone(),
            expires_at,
            username: Some(username.to_string()),
            scope: None,
            token_type: None,
        }
    }

    /// Whether the next authenticated request must refresh this credential first
    pub fn requires_refresh(&self) -> bool {
        self.requires_refresh_at(now_millis())
    }

    /// `requires_refresh` evaluated against an explicit clock reading
    pub fn requires_refresh_at(&self, now: i64) -> bool {
        if self.refresh_token.is_none() {
            return false;
        }

        match self.expires_at {
            Some(expires_at) => expires_at.saturating_sub(now) <= auth::REFRESH_THRESHOLD_MS,
            None => true,
        }
    }

    /// Milliseconds until expiry, negative once expired
    pub fn remaining_millis(&self) -> Option<i64> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_sub(now_millis()))
    }

    /// Username to refresh as: the stored one, else the `email` claim of the token
    pub fn effective_username(&self) -> Option<String> {
        self.username
            .clone()
            .or_else(|| email_claim(&self.access_token))
    }

    /// Token prefix that is safe to write to logs
    pub fn log_prefix(&self) -> String {
        self.access_token
            .chars()
            .take(auth::LOGGED_TOKEN_PREFIX)
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &format_args!("{}...", self.log_prefix()))
            .field("refreshable", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("username", &self.username)
            .finish()
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Absolute expiry `seconds` after `now`, clamped to the `i64` range.
/// Float to integer casts saturate and map NaN to zero.
fn expiry_after(now: i64, seconds: f64) -> i64 {
    now.saturating_add((seconds * 1000.0) as i64)
}

/// Read the `email` claim from a JWT payload without verifying it
fn email_claim(jwt: &str) -> Option<String> {
    let payload = jwt.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("email")?.as_str().map(str::to_string)
}
