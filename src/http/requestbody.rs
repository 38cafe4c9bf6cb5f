//! Request body handed to a transport's `send`.

use crate::http::payload::Payload;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Request body. Text bodies and binary bodies pick different streaming
/// response types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Textual body.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Binary(Bytes::from(v))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Binary(b)
    }
}

impl RequestBody {
    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, RequestBody::Binary(_))
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Text(s) => s.len(),
            RequestBody::Binary(b) => b.len(),
        }
    }

    /// Convert into what `send` receives; `None` means no body.
    pub fn into_payload(self) -> Option<Payload> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Text(s) => Some(Payload::Text(s)),
            RequestBody::Binary(b) => Some(Payload::Binary(b)),
        }
    }
}
