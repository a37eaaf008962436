//! Shared payloads for fan-out delivery.
//!
//! A signaling frame is forwarded to every other connection, so the frame body
//! is kept behind a reference count and each recipient receives a cheap clone
//! of the same bytes instead of a re-serialized copy. Text bodies stay in the
//! transport's UTF-8 buffer type so neither the inbound nor the outbound side
//! copies them.

use axum::extract::ws::Utf8Bytes;
use bytes::Bytes;

/// Frame kind of an inbound message, preserved on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

impl FrameKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// Raw message body exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl RelayPayload {
    pub fn text(text: impl Into<Utf8Bytes>) -> Self {
        Self::Text(text.into())
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::Binary(bytes.into())
    }

    #[inline]
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Binary(_) => FrameKind::Binary,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_str().as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Text view of the payload, if it was received as a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Binary(_) => None,
        }
    }
}

/// Item placed on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Deliver this payload verbatim.
    Payload(RelayPayload),
    /// Send a close frame with the given reason and stop writing.
    Close(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_clones_share_storage() {
        let payload = RelayPayload::text(r#"{"type":"offer","sdp":"x"}"#);
        let clone = payload.clone();
        assert_eq!(payload.kind(), FrameKind::Text);
        assert_eq!(payload.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
    }

    #[test]
    fn owned_text_is_not_copied_on_wrap() {
        let body = String::from(r#"{"type":"answer"}"#);
        let address = body.as_ptr();
        let payload = RelayPayload::text(body);
        assert_eq!(payload.as_bytes().as_ptr(), address);
        assert_eq!(payload.as_text(), Some(r#"{"type":"answer"}"#));
    }

    #[test]
    fn binary_payload_keeps_bytes_verbatim() {
        let payload = RelayPayload::binary(vec![0xFF, 0x00, 0x01]);
        assert_eq!(payload.kind(), FrameKind::Binary);
        assert_eq!(payload.as_bytes(), &[0xFF, 0x00, 0x01]);
        assert_eq!(payload.len(), 3);
        assert!(payload.as_text().is_none());
    }

    #[test]
    fn empty_payload() {
        assert!(RelayPayload::text("").is_empty());
        assert_eq!(RelayPayload::text("").kind().as_str(), "text");
    }
}
