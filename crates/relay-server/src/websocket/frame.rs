//! Chat message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The only application message: `{"name": ..., "msg": ...}`.
///
/// Clients must build frames with a JSON serializer so quotes and control
/// characters in either field are escaped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Display name of the sender.
    pub name: String,
    /// Message body.
    pub msg: String,
}

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Text frame that is not JSON, or an object without string `name` and
    /// `msg` fields.
    #[error("invalid chat frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Valid JSON whose top level is not an object.
    #[error("chat frame must be a JSON object, got {kind}")]
    NotAnObject {
        /// JSON type found at the top level.
        kind: &'static str,
    },
    /// Binary frames are not part of the protocol.
    #[error("binary frames are not supported ({len} bytes)")]
    Binary {
        /// Payload length.
        len: usize,
    },
}

impl ChatFrame {
    /// Parse and validate a text payload.
    ///
    /// Only a JSON object is accepted; serde would otherwise also map a
    /// two-element array onto the struct fields.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        match serde_json::from_str::<Value>(text)? {
            value @ Value::Object(_) => Ok(Self::deserialize(value)?),
            other => Err(FrameError::NotAnObject {
                kind: json_kind(&other),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
