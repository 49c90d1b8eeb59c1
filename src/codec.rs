//! JSON encoding and decoding of [`Message`].
//!
//! Decoding runs in three steps:
//!
//! 1. the `content.type` discriminator is read and checked against the known
//!    variants, so a bad payload is reported by its discriminator rather than
//!    by a generic serde error.
//! 2. the envelope and the selected variant are deserialized.
//! 3. [`Message::validate`] checks the cross-field invariants.
//!
//! Every failure is an [`Error::Validation`]. Unknown extra fields are ignored.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{Message, MessageContent};

/// Encode a message as a JSON string.
///
/// Deterministic: the same value always encodes to the same bytes.
pub fn encode(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Encode a message as JSON bytes.
pub fn encode_vec(message: &Message) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Encode a message as a JSON value.
pub fn encode_value(message: &Message) -> Result<Value> {
    Ok(serde_json::to_value(message)?)
}

/// Decode a message from a JSON string.
pub fn decode(json: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::validation(format!("message is not valid JSON: {e}")))?;
    decode_value(value)
}

/// Decode a message from JSON bytes.
pub fn decode_slice(bytes: &[u8]) -> Result<Message> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::validation(format!("message is not valid JSON: {e}")))?;
    decode_value(value)
}

/// Decode a message from an already-parsed JSON value.
pub fn decode_value(value: Value) -> Result<Message> {
    let type_name = content_type(&value)?.to_string();
    let message: Message = serde_json::from_value(value)
        .map_err(|e| Error::validation(format!("invalid {type_name} message: {e}")))?;
    message.validate()?;
    Ok(message)
}

/// Read and check the `content.type` discriminator of a raw message.
fn content_type(value: &Value) -> Result<&str> {
    let Value::Object(envelope) = value else {
        return Err(Error::validation(format!(
            "message must be a JSON object, got {value}"
        )));
    };
    let content = match envelope.get("content") {
        Some(Value::Object(content)) => content,
        Some(other) => {
            return Err(Error::validation(format!(
                "message content must be a JSON object, got {other}"
            )))
        },
        None => return Err(Error::validation("message has no content")),
    };
    match content.get("type") {
        Some(Value::String(name)) if MessageContent::is_known_type(name) => Ok(name),
        Some(Value::String(name)) => Err(Error::validation(format!(
            "unknown content type `{name}`"
        ))),
        Some(other) => Err(Error::validation(format!(
            "content type must be a string, got {other}"
        ))),
        None => Err(Error::validation(format!(
            "message content has no type: {}",
            Value::Object(content.clone())
        ))),
    }
}

impl Message {
    /// See [`encode`].
    pub fn to_json(&self) -> Result<String> {
        encode(self)
    }

    /// See [`encode_value`].
    pub fn to_value(&self) -> Result<Value> {
        encode_value(self)
    }

    /// See [`decode`].
    pub fn from_json(json: &str) -> Result<Self> {
        decode(json)
    }

    /// See [`decode_slice`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        decode_slice(bytes)
    }

    /// See [`decode_value`].
    pub fn from_value(value: Value) -> Result<Self> {
        decode_value(value)
    }
}
