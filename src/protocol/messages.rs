use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::ClientId;

/// `type` value marking application data that already travelled over an
/// established peer data channel. These messages are consumed locally.
pub const DATA_CHANNEL_MESSAGE_TYPE: &str = "data-channel-message";

/// Prefix browsers put in a data-channel note announcing a binary webcam frame,
/// e.g. `"[Binary data: 4096 bytes]"`.
pub const BINARY_DATA_PREFIX: &str = "[Binary data:";

/// Session-negotiation `type` values the relay recognizes by name.
///
/// The vocabulary is open: unknown types are relayed just the same, they are
/// only classified as generic instead of signaling.
pub const SIGNALING_TYPES: &[&str] = &[
    "offer",
    "answer",
    "ice-candidate",
    "candidate",
    "renegotiate",
    "hangup",
    "bye",
];

/// Returns true when `message_type` names a known signaling message.
#[must_use]
pub fn is_signaling_type(message_type: &str) -> bool {
    SIGNALING_TYPES.contains(&message_type)
}

/// Messages originated by the relay itself (never relayed between clients).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerNotice {
    /// Sent once, right after accept, so the client learns its assigned id.
    ConnectionEstablished {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
}
