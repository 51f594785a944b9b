//! Response definitions
//!
//! The daemon's reply is unstructured: whatever bytes arrive before it
//! closes its write side.

use std::borrow::Cow;

use bytes::Bytes;

/// Raw bytes returned by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    payload: Bytes,
}

impl Response {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decode as UTF-8, replacing invalid sequences
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl From<Bytes> for Response {
    fn from(payload: Bytes) -> Self {
        Self { payload }
    }
}
