//! Push channel message types
//!
//! Frames exchanged with the gateway over `/ws`, JSON encoded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::LightStatePatch;

/// Frames received from the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// A light changed state; `state` holds only the fields that are known
    Status {
        device: String,
        state: LightStatePatch,
    },

    /// Command accepted
    Ack {
        #[serde(default)]
        target: String,
    },

    /// Command rejected or failed on the gateway
    Error {
        #[serde(default)]
        message: String,
    },

    /// Any frame type this client does not understand
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Command {
        /// Mapped device, group or scene id
        target: String,
        /// e.g. "set", "scene"
        action: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
}

impl ClientMessage {
    /// Create a command message
    pub fn command(target: &str, action: &str, params: Map<String, Value>) -> Self {
        ClientMessage::Command {
            target: target.to_string(),
            action: action.to_string(),
            params,
        }
    }

    /// Encode as a single-line JSON text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
