use crate::broadcast::{OutboundFrame, RelayPayload};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

pub(super) type WsSink = SplitSink<WebSocket, Message>;

/// Whether the writer should keep going after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WriteState {
    Open,
    Closing,
}

/// Map a queued frame onto the transport. Text stays text, binary stays
/// binary, and both hand over the shared buffer without copying.
pub(super) fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Payload(RelayPayload::Text(text)) => Message::Text(text),
        OutboundFrame::Payload(RelayPayload::Binary(bytes)) => Message::Binary(bytes),
        OutboundFrame::Close(reason) => close_message(reason),
    }
}

pub(super) fn close_message(reason: impl Into<String>) -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: reason.into().into(),
    }))
}

pub(super) async fn write_frame(
    sender: &mut WsSink,
    frame: OutboundFrame,
) -> Result<WriteState, axum::Error> {
    let state = match frame {
        OutboundFrame::Close(_) => WriteState::Closing,
        OutboundFrame::Payload(_) => WriteState::Open,
    };
    sender.send(to_message(frame)).await?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn text_frames_stay_text() {
        let message = to_message(OutboundFrame::Payload(RelayPayload::text(
            r#"{"type":"offer"}"#,
        )));
        match message {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"type":"offer"}"#),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn text_frames_reuse_the_shared_buffer() {
        let payload = RelayPayload::text(String::from(r#"{"type":"ice-candidate"}"#));
        let address = payload.as_bytes().as_ptr();

        let first = to_message(OutboundFrame::Payload(payload.clone()));
        let second = to_message(OutboundFrame::Payload(payload));
        for message in [first, second] {
            match message {
                Message::Text(text) => assert_eq!(text.as_str().as_ptr(), address),
                other => panic!("expected text, got {other:?}"),
            }
        }
    }

    #[test]
    fn binary_frames_stay_binary() {
        let bytes = Bytes::from_static(&[0xFF, 0x00, 0x01]);
        let message = to_message(OutboundFrame::Payload(RelayPayload::binary(bytes.clone())));
        assert_eq!(message, Message::Binary(bytes));
    }

    #[test]
    fn close_frames_carry_the_reason() {
        match to_message(OutboundFrame::Close("idle timeout".to_string())) {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, close_code::NORMAL);
                assert_eq!(frame.reason.as_str(), "idle timeout");
            }
            other => panic!("expected close, got {other:?}"),
        }
    }
}
