//! Message envelope
//!
//! Every exchange between the engine and a capability travels in a
//! [`Message`]: a protocol version, the producing component, an opaque
//! payload and an auxiliary metadata mapping. Messages are immutable once
//! built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Protocol version stamped on every message.
pub const PROTOCOL_VERSION: &str = "1.0";

const REQUIRED_KEYS: [&str; 4] = ["protocol_version", "sender", "content", "metadata"];

/// Message validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("unsupported protocol version '{0}'")]
    UnsupportedVersion(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// The uniform envelope passed between engine and capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    protocol_version: String,
    sender: String,
    content: Value,
    metadata: Map<String, Value>,
}

impl Message {
    /// Create a message with empty metadata.
    pub fn new(sender: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            sender: sender.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Consume the message, keeping only its payload.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// Read a named field of a mapping payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.content.get(key)
    }

    /// Read a named text field of a mapping payload, ignoring blank values.
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.field(key)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    /// Check the envelope was produced under the supported protocol.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(MessageError::UnsupportedVersion(
                self.protocol_version.clone(),
            ));
        }
        Ok(())
    }
}

/// Validate a raw JSON envelope and convert it into a [`Message`].
///
/// All four keys must be present; `metadata` must be an object.
pub fn validate_message(raw: &Value) -> Result<Message, MessageError> {
    let object = raw.as_object().ok_or(MessageError::NotAnObject)?;
    for key in REQUIRED_KEYS {
        if !object.contains_key(key) {
            return Err(MessageError::MissingKey(key));
        }
    }

    let message: Message = serde_json::from_value(raw.clone())
        .map_err(|e| MessageError::Malformed(e.to_string()))?;
    message.validate()?;
    Ok(message)
}
