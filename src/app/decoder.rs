//! Cascading response decoder
//!
//! Turns a status code and raw body into either the caller's requested type or a
//! classified `TransportError`. The cascade, in order:
//!
//! 1. Non-success status: the body is read as an error envelope, or an envelope is
//!    synthesized from the status reason phrase.
//! 2. `NoContent` target: the body must be empty.
//! 3. The requested type, then the error envelope (servers sometimes embed errors in a
//!    200), then for `String` targets the raw UTF-8 bytes.
//! 4. Otherwise a decoding failure wrapping the original parse error.

use std::any::{Any, TypeId};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::app::models::{NoContent, ServerMessage};
use crate::constants::logging::DIAGNOSTICS_TARGET;
use crate::errors::{DecodeFailure, TransportError, TransportResult};

/// A completed HTTP exchange awaiting classification
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub url: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }
}

/// 2xx and 3xx count as success
pub fn is_success(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

/// Classifies responses; stateless apart from the diagnostics switch
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder {
    debug_logging: bool,
}

impl ResponseDecoder {
    pub fn new(debug_logging: bool) -> Self {
        Self { debug_logging }
    }

    /// Decode a response as `T`
    ///
    /// # Arguments
    ///
    /// * `response` - Status, URL and body of the completed exchange
    /// * `request_body` - Encoded request body, used only for diagnostics
    ///
    /// # Errors
    ///
    /// * `ServerError` - non-success status, or an error envelope in a success body
    /// * `FailedDecodingResponse` - the body matched neither `T` nor the envelope
    pub fn decode<T>(
        &self,
        response: &RawResponse,
        request_body: Option<&[u8]>,
    ) -> TransportResult<T>
    where
        T: DeserializeOwned + 'static,
    {
        self.log_exchange(response, request_body);

        if !is_success(response.status) {
            return Err(self.failure(response));
        }

        if TypeId::of::<T>() == TypeId::of::<NoContent>() {
            if !response.body.is_empty() {
                warn!(
                    "Expected an empty response from {}, received {} bytes",
                    response.url,
                    response.body.len()
                );
                return Err(DecodeFailure::UnexpectedContent {
                    len: response.body.len(),
                }
                .into());
            }
            return cast(NoContent).ok_or_else(|| DecodeFailure::MissingResource.into());
        }

        let original = match serde_json::from_slice::<T>(&response.body) {
            Ok(value) => {
                debug!("Decoded response from {}", response.url);
                return Ok(value);
            }
            Err(e) => e,
        };

        if let Ok(message) = serde_json::from_slice::<ServerMessage>(&response.body) {
            debug!("Response from {} carried an error envelope", response.url);
            return Err(TransportError::ServerError(message));
        }

        if TypeId::of::<T>() == TypeId::of::<String>() {
            if let Ok(text) = std::str::from_utf8(&response.body) {
                if let Some(value) = cast(text.to_string()) {
                    return Ok(value);
                }
            }
        }

        warn!(
            "Failed to decode response from {}: {}",
            response.url, original
        );
        Err(DecodeFailure::Json(original).into())
    }

    /// Server error for a response with a non-success status
    pub fn failure(&self, response: &RawResponse) -> TransportError {
        debug!(
            "Server responded with status {} to {}",
            response.status.as_u16(),
            response.url
        );
        TransportError::ServerError(self.error_envelope(response.status, &response.body))
    }

    /// Envelope for a failed response, carrying the HTTP status.
    ///
    /// Falls back to the status reason phrase when the body is not an envelope.
    pub fn error_envelope(&self, status: StatusCode, body: &[u8]) -> ServerMessage {
        match serde_json::from_slice::<ServerMessage>(body) {
            Ok(message) => message.with_status(status.as_u16()),
            Err(_) => ServerMessage::from_status(status),
        }
    }

    fn log_exchange(&self, response: &RawResponse, request_body: Option<&[u8]>) {
        if !self.debug_logging {
            return;
        }

        if let Some(body) = request_body {
            debug!(
                target: DIAGNOSTICS_TARGET,
                "Request to {}: {}",
                response.url,
                String::from_utf8_lossy(body)
            );
        }
        debug!(
            target: DIAGNOSTICS_TARGET,
            "Response {} from {}: {}",
            response.status.as_u16(),
            response.url,
            String::from_utf8_lossy(&response.body)
        );
    }
}

/// Move a value into `T` when they are the same type
fn cast<T: 'static, U: 'static>(value: U) -> Option<T> {
    let boxed: Box<dyn Any> = Box::new(value);
    boxed.downcast::<T>().ok().map(|value| *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        email: String,
    }

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            "https://api.example.com/rest/test",
            body.as_bytes().to_vec(),
        )
    }

    fn decoder() -> ResponseDecoder {
        ResponseDecoder::new(true)
    }

    #[test]
    fn test_server_error_envelope_for_any_target() {
        let raw = response(500, r#"{"message":"A server error occurred","statusCode":500}"#);

        for result in [
            decoder().decode::<User>(&raw, None).map(|_| ()),
            decoder().decode::<String>(&raw, None).map(|_| ()),
            decoder().decode::<NoContent>(&raw, None).map(|_| ()),
        ] {
            let error = result.unwrap_err();
            let message = error.server_message().unwrap();
            assert_eq!(message.message, "A server error occurred");
            assert_eq!(message.status_code, Some(500));
        }
    }

    #[test]
    fn test_failure_status_overrides_envelope_status() {
        let raw = response(403, r#"{"message":"forbidden","statusCode":200}"#);
        let error = decoder().decode::<User>(&raw, None).unwrap_err();
        assert_eq!(error.status_code(), Some(403));
    }

    #[test]
    fn test_failure_without_envelope_uses_reason_phrase() {
        let raw = response(404, "<html>not json</html>");
        let error = decoder().decode::<User>(&raw, None).unwrap_err();
        let message = error.server_message().unwrap();
        assert_eq!(message.message, "not found");
        assert_eq!(message.status_code, Some(404));
    }

    #[test]
    fn test_no_content_requires_empty_body() {
        assert_eq!(
            decoder().decode::<NoContent>(&response(200, ""), None).unwrap(),
            NoContent
        );
        assert_eq!(
            decoder().decode::<NoContent>(&response(204, ""), None).unwrap(),
            NoContent
        );

        let error = decoder()
            .decode::<NoContent>(&response(200, "{}"), None)
            .unwrap_err();
        assert!(matches!(
            error,
            TransportError::FailedDecodingResponse(DecodeFailure::UnexpectedContent { len: 2 })
        ));
    }

    #[test]
    fn test_target_type_decodes() {
        let raw = response(200, r#"{"id":7,"email":"a@b.c"}"#);
        let user: User = decoder().decode(&raw, Some(b"{}")).unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                email: "a@b.c".into()
            }
        );
    }

    #[test]
    fn test_embedded_envelope_in_success_body() {
        let raw = response(200, r#"{"message":"Token expired"}"#);
        let error = decoder().decode::<User>(&raw, None).unwrap_err();
        let message = error.server_message().unwrap();
        assert_eq!(message.message, "Token expired");
        assert_eq!(message.status_code, None);
    }

    #[test]
    fn test_string_targets() {
        let quoted: String = decoder().decode(&response(200, r#""hello""#), None).unwrap();
        assert_eq!(quoted, "hello");

        let bare: String = decoder().decode(&response(200, "hello"), None).unwrap();
        assert_eq!(bare, "hello");
    }

    #[test]
    fn test_schema_drift_is_a_decoding_failure() {
        let raw = response(200, r#"{"id":"not-a-number"}"#);
        let error = decoder().decode::<User>(&raw, None).unwrap_err();
        assert!(matches!(
            error,
            TransportError::FailedDecodingResponse(DecodeFailure::Json(_))
        ));
    }

    #[test]
    fn test_redirect_status_is_success() {
        let raw = response(302, r#"{"id":1,"email":"x@y.z"}"#);
        assert!(decoder().decode::<User>(&raw, None).is_ok());
    }
}
