//! The header + body wrapper around every inbound message.
//!
//! Wire format:
//!
//! ```json
//! {
//!   "header": {"messageId": "…", "messageType": "GL_PROJECT_FORK", "version": "v1",
//!              "timestamp": "2024-05-01T10:00:00Z", "correlationId": "…", "source": "…"},
//!   "body": {"payload": { … }}
//! }
//! ```
//!
//! [`Envelope::from_slice`] is the validation boundary for the envelope shape.
//! The payload stays an untyped JSON object here; it is decoded into a typed
//! [`Command`](crate::Command) once the message type is known.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CorrelationId, MessageId, Timestamp, ValidationError};

/// Protocol version stamped on messages that omit `header.version`.
pub const DEFAULT_VERSION: &str = "v1";

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Routing and tracing metadata.
    pub header: MessageHeader,
    /// The type-specific content.
    pub body: MessageBody,
}

/// Message metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    /// Producer-assigned unique id.
    pub message_id: MessageId,
    /// Discriminator selecting the handler; kept verbatim so unknown types can
    /// be reported.
    pub message_type: String,
    /// Envelope protocol version.
    pub version: String,
    /// Producer timestamp; the receipt time when the producer sent none.
    pub timestamp: Timestamp,
    /// Optional id shared by messages of one business flow.
    pub correlation_id: Option<CorrelationId>,
    /// Optional name of the producing service.
    pub source: Option<String>,
}

/// Message content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageBody {
    /// Type-specific fields.
    pub payload: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Wire shapes
//
// Every field is optional here so that absence is reported as a
// `MissingField` naming the wire key, rather than a generic serde message.
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawEnvelope {
    header: Option<RawHeader>,
    body: Option<RawBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    message_id: Option<String>,
    message_type: Option<String>,
    version: Option<String>,
    timestamp: Option<String>,
    correlation_id: Option<String>,
    source: Option<String>,
}

#[derive(Deserialize)]
struct RawBody {
    payload: Option<Value>,
}

impl Envelope {
    /// Parses and validates raw delivery bytes.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Malformed`] if the bytes are not JSON of the
    ///   envelope shape.
    /// - [`ValidationError::MissingField`] if `header`, `messageId`,
    ///   `messageType`, `body` or `payload` is absent or blank.
    /// - [`ValidationError::InvalidField`] if `payload` is not an object or
    ///   `timestamp` is not ISO-8601.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed {
                message: e.to_string(),
            })?;

        let header = raw
            .header
            .ok_or(ValidationError::MissingField { field: "header" })?;
        let message_type = header
            .message_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingField {
                field: "header.messageType",
            })?;
        let message_id = header
            .message_id
            .and_then(MessageId::new)
            .ok_or(ValidationError::MissingField {
                field: "header.messageId",
            })?;
        let timestamp = match header.timestamp {
            Some(raw) => Timestamp::parse(&raw).ok_or_else(|| ValidationError::InvalidField {
                field: "header.timestamp".to_string(),
                message: format!("not an ISO-8601 timestamp: {raw:?}"),
            })?,
            None => Timestamp::now(),
        };

        let payload = raw
            .body
            .and_then(|b| b.payload)
            .ok_or(ValidationError::MissingField {
                field: "body.payload",
            })?;
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => {
                return Err(ValidationError::MissingField {
                    field: "body.payload",
                })
            }
            other => {
                return Err(ValidationError::InvalidField {
                    field: "body.payload".to_string(),
                    message: format!("expected an object, got {}", json_kind(&other)),
                })
            }
        };

        Ok(Self {
            header: MessageHeader {
                message_id,
                message_type,
                version: header
                    .version
                    .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                timestamp,
                correlation_id: header.correlation_id.and_then(CorrelationId::new),
                source: header.source,
            },
            body: MessageBody { payload },
        })
    }

    /// Builds a new outbound envelope with a fresh random message id.
    ///
    /// Used by producers and tooling that publish messages in this format.
    pub fn new(
        message_type: impl Into<String>,
        payload: Map<String, Value>,
        source: impl Into<String>,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        Self {
            header: MessageHeader {
                message_id: MessageId::random(),
                message_type: message_type.into(),
                version: DEFAULT_VERSION.to_string(),
                timestamp: Timestamp::now(),
                correlation_id,
                source: Some(source.into()),
            },
            body: MessageBody { payload },
        }
    }

    /// Serialises the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; with string keys this does not happen in
    /// practice.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
