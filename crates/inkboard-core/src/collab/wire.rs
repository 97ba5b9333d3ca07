//! Messages exchanged with peers through the relay.

use crate::element::Element;
use serde::{Deserialize, Serialize};

/// Relay-level peer identifier.
pub type PeerId = String;

/// A message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Encrypted [`ScenePayload`], base64 encoded.
    SceneUpdate { from: PeerId, payload: String },
    /// Pointer position of a peer in scene coordinates. Sent in the clear.
    PeerCursor {
        from: PeerId,
        cursor: CursorPosition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
}

impl WireMessage {
    /// Sender of the message.
    pub fn from(&self) -> &str {
        match self {
            WireMessage::SceneUpdate { from, .. } | WireMessage::PeerCursor { from, .. } => from,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Whether a payload carries changed elements or the whole scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Delta,
    Full,
}

/// Plaintext of a scene update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePayload {
    pub kind: PayloadKind,
    /// Sender's scene version at the time of sending.
    pub scene_version: u64,
    pub elements: Vec<Element>,
}
