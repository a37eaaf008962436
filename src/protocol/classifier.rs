//! Total classification of inbound relay messages.
//!
//! Every raw payload maps to exactly one [`ClassifiedMessage`]. A payload
//! that is not JSON is a [`ClassifiedMessage::Malformed`] outcome, not an
//! error, so callers branch on the variant instead of on a parse failure.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::{is_signaling_type, BINARY_DATA_PREFIX, DATA_CHANNEL_MESSAGE_TYPE};
use crate::broadcast::RelayPayload;

/// Shape of a data-channel `payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChannelKind {
    /// Free-form text exchanged between peers.
    TextNote,
    /// Text note announcing a binary webcam frame (`"[Binary data: ..."`).
    WebcamFrameNotice,
    /// Anything else, typically a size descriptor for a binary blob.
    RawBinary,
}

impl DataChannelKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextNote => "text_note",
            Self::WebcamFrameNotice => "webcam_frame_notice",
            Self::RawBinary => "raw_binary",
        }
    }
}

/// A `data-channel-message` with its typed fields pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChannelMessage {
    pub kind: DataChannelKind,
    /// The `payload` field; `Value::Null` when absent.
    pub payload: Value,
    /// Optional `clientId` claimed by the sender. Informational only.
    pub client_id: Option<String>,
    /// Optional ISO-8601 `timestamp` stamped by the sender.
    pub timestamp: Option<String>,
}

impl DataChannelMessage {
    /// Text content for text notes and frame notices.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_str()
    }

    /// Best-effort byte size of the data the message describes.
    ///
    /// Frame notices report the number embedded in the note, descriptors report
    /// their numeric `size` field, anything else reports its encoded length.
    pub fn reported_size(&self) -> usize {
        match self.kind {
            DataChannelKind::WebcamFrameNotice => self
                .text()
                .and_then(parse_notice_size)
                .unwrap_or_default(),
            DataChannelKind::TextNote => self.text().map(str::len).unwrap_or_default(),
            DataChannelKind::RawBinary => match &self.payload {
                Value::Null => 0,
                Value::Object(map) => map
                    .get("size")
                    .and_then(Value::as_u64)
                    .map(|size| usize::try_from(size).unwrap_or(usize::MAX))
                    .unwrap_or_else(|| self.payload.to_string().len()),
                Value::Array(items) => items.len(),
                other => other.to_string().len(),
            },
        }
    }
}

/// Handling category of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedMessage {
    /// A known session-negotiation message, relayed verbatim.
    Signaling { signal_type: String, raw: RelayPayload },
    /// Peer data-channel traffic, consumed locally.
    DataChannel(DataChannelMessage),
    /// Parsed JSON without a recognized `type`. `type_tag` is `None` when the
    /// value has no string `type` field at all.
    Generic {
        type_tag: Option<String>,
        raw: RelayPayload,
    },
    /// Payload that is not JSON.
    Malformed { raw: RelayPayload },
}

impl ClassifiedMessage {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Signaling { .. } => "signaling",
            Self::DataChannel(_) => "data_channel",
            Self::Generic { .. } => "generic",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Classify a raw payload. Pure and infallible.
///
/// Valid JSON nested past the parser's recursion limit is still classified
/// by its top-level fields; only bytes that are not JSON at all are
/// malformed.
pub fn classify(raw: RelayPayload) -> ClassifiedMessage {
    match serde_json::from_slice::<Value>(raw.as_bytes()) {
        Ok(value) => {
            let type_tag = string_field(&value, "type");
            if type_tag.as_deref() == Some(DATA_CHANNEL_MESSAGE_TYPE) {
                return ClassifiedMessage::DataChannel(data_channel_message(value));
            }
            by_type_tag(type_tag, raw)
        }
        Err(_) => classify_deep(raw),
    }
}

fn by_type_tag(type_tag: Option<String>, raw: RelayPayload) -> ClassifiedMessage {
    match type_tag {
        Some(tag) if is_signaling_type(&tag) => ClassifiedMessage::Signaling {
            signal_type: tag,
            raw,
        },
        type_tag => ClassifiedMessage::Generic { type_tag, raw },
    }
}

/// Second pass for input the tree parser rejected. `IgnoredAny` walks nested
/// values without a depth limit, so this separates deep but valid JSON from
/// garbage.
fn classify_deep(raw: RelayPayload) -> ClassifiedMessage {
    if serde_json::from_slice::<IgnoredAny>(raw.as_bytes()).is_err() {
        return ClassifiedMessage::Malformed { raw };
    }
    let Ok(envelope) = serde_json::from_slice::<Envelope>(raw.as_bytes()) else {
        return ClassifiedMessage::Malformed { raw };
    };

    if envelope.type_tag.as_deref() == Some(DATA_CHANNEL_MESSAGE_TYPE) {
        let payload = envelope.payload.map(Value::String).unwrap_or(Value::Null);
        return ClassifiedMessage::DataChannel(DataChannelMessage {
            kind: kind_of(&payload),
            payload,
            client_id: envelope.client_id,
            timestamp: envelope.timestamp,
        });
    }
    by_type_tag(envelope.type_tag, raw)
}

/// Top-level string fields of a message, read without building the nested
/// values. Non-string fields and non-object documents leave them `None`.
#[derive(Debug, Default)]
struct Envelope {
    type_tag: Option<String>,
    payload: Option<String>,
    client_id: Option<String>,
    timestamp: Option<String>,
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EnvelopeVisitor)
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = Envelope;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Envelope, A::Error> {
        let mut envelope = Envelope::default();
        while let Some(key) = map.next_key::<String>()? {
            let slot = match key.as_str() {
                "type" => &mut envelope.type_tag,
                "payload" => &mut envelope.payload,
                "clientId" => &mut envelope.client_id,
                "timestamp" => &mut envelope.timestamp,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
            };
            *slot = map.next_value::<StringOrSkip>()?.0;
        }
        Ok(envelope)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Envelope, A::Error> {
        IgnoredAny.visit_seq(seq)?;
        Ok(Envelope::default())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Envelope, E> {
        Ok(Envelope::default())
    }
}

/// A field value kept only when it is a string.
struct StringOrSkip(Option<String>);

impl<'de> Deserialize<'de> for StringOrSkip {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StringOrSkipVisitor)
    }
}

struct StringOrSkipVisitor;

impl<'de> Visitor<'de> for StringOrSkipVisitor {
    type Value = StringOrSkip;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(Some(value.to_owned())))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(Some(value)))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<StringOrSkip, A::Error> {
        IgnoredAny.visit_map(map)?;
        Ok(StringOrSkip(None))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<StringOrSkip, A::Error> {
        IgnoredAny.visit_seq(seq)?;
        Ok(StringOrSkip(None))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<StringOrSkip, E> {
        Ok(StringOrSkip(None))
    }
}

fn data_channel_message(mut value: Value) -> DataChannelMessage {
    let client_id = string_field(&value, "clientId");
    let timestamp = string_field(&value, "timestamp");
    let payload = value
        .get_mut("payload")
        .map(Value::take)
        .unwrap_or(Value::Null);

    DataChannelMessage {
        kind: kind_of(&payload),
        payload,
        client_id,
        timestamp,
    }
}

fn kind_of(payload: &Value) -> DataChannelKind {
    match payload.as_str() {
        Some(text) if text.starts_with(BINARY_DATA_PREFIX) => DataChannelKind::WebcamFrameNotice,
        Some(_) => DataChannelKind::TextNote,
        None => DataChannelKind::RawBinary,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Extract `4096` from `"[Binary data: 4096 bytes]"`.
fn parse_notice_size(note: &str) -> Option<usize> {
    note.strip_prefix(BINARY_DATA_PREFIX)?
        .split_whitespace()
        .next()?
        .trim_end_matches(']')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn text(value: serde_json::Value) -> RelayPayload {
        RelayPayload::text(value.to_string())
    }

    #[test]
    fn offer_is_signaling_and_keeps_raw_bytes() {
        let raw = RelayPayload::text(r#"{"type":"offer","sdp":"x"}"#);
        match classify(raw.clone()) {
            ClassifiedMessage::Signaling {
                signal_type,
                raw: kept,
            } => {
                assert_eq!(signal_type, "offer");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn binary_data_note_is_webcam_frame_notice() {
        let classified = classify(text(json!({
            "type": "data-channel-message",
            "payload": "[Binary data: 4096 bytes]",
            "clientId": "cam-1",
            "timestamp": "2024-05-01T12:00:00Z"
        })));
        let ClassifiedMessage::DataChannel(message) = classified else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::WebcamFrameNotice);
        assert_eq!(message.reported_size(), 4096);
        assert_eq!(message.client_id.as_deref(), Some("cam-1"));
        assert_eq!(message.timestamp.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn plain_string_payload_is_text_note() {
        let classified = classify(text(json!({
            "type": "data-channel-message",
            "payload": "hello there"
        })));
        let ClassifiedMessage::DataChannel(message) = classified else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::TextNote);
        assert_eq!(message.text(), Some("hello there"));
        assert_eq!(message.reported_size(), 11);
    }

    #[test]
    fn prefix_must_be_at_start() {
        let classified = classify(text(json!({
            "type": "data-channel-message",
            "payload": "note: [Binary data: 12 bytes]"
        })));
        assert!(matches!(
            classified,
            ClassifiedMessage::DataChannel(DataChannelMessage {
                kind: DataChannelKind::TextNote,
                ..
            })
        ));
    }

    #[test]
    fn non_string_payload_is_raw_binary() {
        let classified = classify(text(json!({
            "type": "data-channel-message",
            "payload": { "size": 2048 }
        })));
        let ClassifiedMessage::DataChannel(message) = classified else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::RawBinary);
        assert_eq!(message.reported_size(), 2048);
    }

    #[test]
    fn missing_payload_is_raw_binary_of_size_zero() {
        let classified = classify(text(json!({ "type": "data-channel-message" })));
        let ClassifiedMessage::DataChannel(message) = classified else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::RawBinary);
        assert_eq!(message.payload, Value::Null);
        assert_eq!(message.reported_size(), 0);
    }

    #[test]
    fn unknown_type_is_generic() {
        let classified = classify(text(json!({ "type": "chat", "text": "hi" })));
        assert!(matches!(
            classified,
            ClassifiedMessage::Generic { type_tag: Some(ref tag), .. } if tag == "chat"
        ));
    }

    #[test]
    fn json_without_type_is_generic_without_tag() {
        for raw in [r#"{"sdp":"x"}"#, "[1,2,3]", "42", r#"{"type":7}"#] {
            let classified = classify(RelayPayload::text(raw));
            assert!(
                matches!(classified, ClassifiedMessage::Generic { type_tag: None, .. }),
                "{raw} should be generic without a tag"
            );
        }
    }

    #[test]
    fn non_json_bytes_are_malformed() {
        let raw = RelayPayload::binary(vec![0xFF, 0x00, 0x01]);
        assert_eq!(
            classify(raw.clone()),
            ClassifiedMessage::Malformed { raw }
        );
    }

    #[test]
    fn empty_and_truncated_input_is_malformed() {
        for raw in ["", "   ", "{\"type\":\"offer\"", "not json"] {
            assert_eq!(classify(RelayPayload::text(raw)).label(), "malformed");
        }
    }

    #[test]
    fn json_inside_binary_frame_is_still_classified() {
        let raw = RelayPayload::binary(br#"{"type":"answer","sdp":"y"}"#.to_vec());
        assert_eq!(classify(raw).label(), "signaling");
    }

    fn nested_array(depth: usize) -> String {
        format!("{}0{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn deeply_nested_signaling_is_still_signaling() {
        let body = format!(r#"{{"type":"offer","sdp":{}}}"#, nested_array(200));
        assert!(serde_json::from_str::<Value>(&body).is_err());

        let raw = RelayPayload::text(body);
        match classify(raw.clone()) {
            ClassifiedMessage::Signaling {
                signal_type,
                raw: kept,
            } => {
                assert_eq!(signal_type, "offer");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn deeply_nested_without_known_type_is_generic() {
        let tagged = format!(r#"{{"extra":{},"type":"chat"}}"#, nested_array(300));
        assert!(matches!(
            classify(RelayPayload::text(tagged)),
            ClassifiedMessage::Generic { type_tag: Some(ref tag), .. } if tag == "chat"
        ));

        let bare = nested_array(300);
        assert!(matches!(
            classify(RelayPayload::text(bare)),
            ClassifiedMessage::Generic { type_tag: None, .. }
        ));
    }

    #[test]
    fn deeply_nested_data_channel_message_is_consumed() {
        let notice = format!(
            r#"{{"type":"data-channel-message","meta":{},"payload":"[Binary data: 512 bytes]","clientId":"cam"}}"#,
            nested_array(200)
        );
        let ClassifiedMessage::DataChannel(message) = classify(RelayPayload::text(notice)) else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::WebcamFrameNotice);
        assert_eq!(message.reported_size(), 512);
        assert_eq!(message.client_id.as_deref(), Some("cam"));

        let deep_payload = format!(
            r#"{{"type":"data-channel-message","payload":{}}}"#,
            nested_array(200)
        );
        let ClassifiedMessage::DataChannel(message) = classify(RelayPayload::text(deep_payload))
        else {
            panic!("expected data-channel message");
        };
        assert_eq!(message.kind, DataChannelKind::RawBinary);
    }

    #[test]
    fn deeply_nested_but_truncated_is_malformed() {
        let body = format!(r#"{{"type":"offer","sdp":{}"#, "[".repeat(200));
        assert_eq!(classify(RelayPayload::text(body)).label(), "malformed");

        let unbalanced = format!("{}{}", nested_array(200), "]");
        assert_eq!(classify(RelayPayload::text(unbalanced)).label(), "malformed");
    }

    #[test]
    fn notice_size_parsing() {
        assert_eq!(parse_notice_size("[Binary data: 4096 bytes]"), Some(4096));
        assert_eq!(parse_notice_size("[Binary data: 17]"), Some(17));
        assert_eq!(parse_notice_size("[Binary data: many bytes]"), None);
        assert_eq!(parse_notice_size("text"), None);
    }

    proptest! {
        #[test]
        fn classification_is_total_and_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let first = classify(RelayPayload::binary(bytes.clone()));
            let second = classify(RelayPayload::binary(bytes.clone()));
            prop_assert_eq!(&first, &second);
            let is_json = serde_json::from_slice::<IgnoredAny>(&bytes).is_ok();
            prop_assert_eq!(first.label() == "malformed", !is_json);
        }

        #[test]
        fn data_channel_string_payloads_never_relay(note in ".{0,64}") {
            let raw = text(json!({ "type": "data-channel-message", "payload": note.clone() }));
            let ClassifiedMessage::DataChannel(message) = classify(raw) else {
                panic!("expected data-channel message");
            };
            let expected = if note.starts_with(BINARY_DATA_PREFIX) {
                DataChannelKind::WebcamFrameNotice
            } else {
                DataChannelKind::TextNote
            };
            prop_assert_eq!(message.kind, expected);
        }
    }
}
