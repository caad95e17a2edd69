//! Protocol decoding errors.

use thiserror::Error;

/// Errors produced while decoding frames and response bodies.
///
/// Every variant describes malformed input. None of them is transient:
/// re-reading the same bytes fails the same way, so callers log and drop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not valid JSON
    #[error("invalid json: {0}")]
    Json(String),

    /// Frame is valid JSON but not an object
    #[error("frame is not a json object")]
    NotAnObject,

    /// Frame has no string `type` field
    #[error("frame has no type field")]
    MissingType,

    /// Ack frame without a numeric `id`
    #[error("ack frame has no id")]
    MissingAckId,

    /// The `data` of a known event type does not match its schema
    #[error("invalid {event_type} payload: {reason}")]
    InvalidPayload {
        /// Event type the payload was declared as
        event_type: String,
        /// Underlying decoder message
        reason: String,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
