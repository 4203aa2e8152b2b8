//! Envelope - payload of the generic queue.

use serde::{Deserialize, Serialize};

/// payload_type + JSON payload.
///
/// One generic queue carries many payload types; the `payload_type` tag picks
/// the handler (see `typed::TypedRegistry`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    payload_type: String,
    payload: serde_json::Value,
}

impl Envelope {
    pub fn new(payload_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            payload_type: payload_type.into(),
            payload,
        }
    }

    pub fn payload_type(&self) -> &str {
        &self.payload_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }
}
