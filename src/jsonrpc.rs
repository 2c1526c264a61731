//! JSON-RPC 2.0 wire shapes emitted by the transport itself.

use serde::Serialize;
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Server error code used when processing an inbound line fails.
pub const INTERNAL_ERROR: i64 = -32000;

/// Standard code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// `error` member of a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
}

/// JSON-RPC error response. Field order matches the wire format:
/// `jsonrpc`, `error`, `id`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Error details.
    pub error: ErrorObject,
    /// Request id, or `null` when the failing line has no known id.
    pub id: Value,
}

impl ErrorEnvelope {
    /// Build an error envelope; `None` serializes as `"id": null`.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            error: ErrorObject {
                code,
                message: message.into(),
            },
            id: id.unwrap_or(Value::Null),
        }
    }
}

/// One outbound message: pre-serialized text or a structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Written verbatim.
    Text(String),
    /// Serialized to compact JSON before writing.
    Json(Value),
}

impl OutboundMessage {
    /// Render the message as a single line of text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the value cannot be serialized.
    pub fn into_line(self) -> serde_json::Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => serde_json::to_string(&value),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
