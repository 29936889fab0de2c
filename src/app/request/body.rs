//! Request body encodings

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use super::query::QueryParams;
use crate::errors::{TransportError, TransportResult};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Body attached to a request descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON value, encoded with sorted keys
    Json(Value),
    /// URL-encoded form parameters
    Form(QueryParams),
    /// Raw string sent verbatim
    Raw {
        content: String,
        content_type: String,
    },
}

impl RequestBody {
    /// Capture any serializable value as a JSON body
    ///
    /// # Errors
    ///
    /// Returns `FailedEncodingRequestBody` if the value cannot be represented as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> TransportResult<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| TransportError::encoding(e.to_string()))
    }

    pub fn form(params: QueryParams) -> Self {
        Self::Form(params)
    }

    /// Plain-text body
    pub fn raw(content: impl Into<String>) -> Self {
        Self::Raw {
            content: content.into(),
            content_type: TEXT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Json(_) => JSON_CONTENT_TYPE,
            Self::Form(_) => FORM_CONTENT_TYPE,
            Self::Raw { content_type, .. } => content_type,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Encode the body to the bytes sent on the wire
    pub fn encode(&self) -> TransportResult<Vec<u8>> {
        match self {
            Self::Json(value) => sorted_json(value),
            Self::Form(params) => Ok(params.to_string().into_bytes()),
            Self::Raw { content, .. } => Ok(content.clone().into_bytes()),
        }
    }
}

/// Serialize JSON with object keys in sorted order at every depth
pub fn sorted_json(value: &Value) -> TransportResult<Vec<u8>> {
    serde_json::to_vec(&SortedKeys(value)).map_err(|e| TransportError::encoding(e.to_string()))
}

struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut state = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    state.serialize_entry(key, &SortedKeys(value))?;
                }
                state.end()
            }
            Value::Array(items) => {
                let mut state = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    state.serialize_element(&SortedKeys(item))?;
                }
                state.end()
            }
            other => other.serialize(serializer),
        }
    }
}
