//! Length-prefixed framing over the wire vocabulary.
//!
//! `[4-byte big-endian u32 length N][N bytes payload]`. The payload is a
//! JSON value carrying a `"kind"` discriminator, but nothing above this
//! module depends on that choice — any tag-preserving encoding satisfies
//! the contract `decode(encode(m)) == m`.

use crate::error::{Error, Result};
use crate::message::InputMessage;

/// Frames larger than this are rejected as a fatal protocol error rather
/// than accepted and potentially exhausting memory on a hostile peer.
pub const MAX_FRAME_BYTES: u32 = 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Serialise `msg` to its JSON payload, with no length prefix. Used by
/// the connection layer, which already knows how many bytes it read and
/// writes the length prefix itself to avoid a second buffer copy.
pub fn encode_payload(msg: &InputMessage) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(|e| Error::Encode(e.to_string()))
}

/// Parse a JSON payload (with no length prefix) back into an
/// `InputMessage`. An unrecognised `"kind"` discriminator is reported as
/// `Error::UnknownVariant`, which callers should log and skip rather than
/// treat as fatal.
pub fn decode_payload(payload: &[u8]) -> Result<InputMessage> {
    match serde_json::from_slice::<InputMessage>(payload) {
        Ok(msg) => Ok(msg),
        Err(e) => {
            if looks_like_unknown_variant(payload) {
                Err(Error::UnknownVariant(e.to_string()))
            } else {
                Err(Error::protocol(e))
            }
        }
    }
}

/// Heuristic used only to route a `serde_json` failure to the right
/// error kind: if the payload at least parses as a JSON object with a
/// `"kind"` field serde doesn't recognise, treat it as the recoverable
/// "unknown variant" case; otherwise it's a malformed/corrupt frame.
fn looks_like_unknown_variant(payload: &[u8]) -> bool {
    matches!(
        serde_json::from_slice::<serde_json::Value>(payload),
        Ok(serde_json::Value::Object(ref map)) if map.contains_key("kind")
    )
}

/// Encode `msg` into a complete frame: 4-byte big-endian length prefix
/// followed by the JSON payload. Never produces a frame whose length
/// exceeds [`MAX_FRAME_BYTES`].
pub fn encode(msg: &InputMessage) -> Result<Vec<u8>> {
    let payload = encode_payload(msg)?;
    if payload.len() as u64 > MAX_FRAME_BYTES as u64 {
        return Err(Error::protocol(format!(
            "encoded message is {} bytes, exceeds cap of {}",
            payload.len(),
            MAX_FRAME_BYTES
        )));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a complete frame (length prefix + payload) back into an
/// `InputMessage`. A length prefix that disagrees with the number of
/// trailing bytes, or one that exceeds [`MAX_FRAME_BYTES`], is a fatal
/// protocol error — it means the stream itself is desynchronised, not
/// just this one message.
pub fn decode(frame: &[u8]) -> Result<InputMessage> {
    if frame.len() < HEADER_LEN {
        return Err(Error::protocol("frame shorter than the length header"));
    }
    let (header, payload) = frame.split_at(HEADER_LEN);
    let declared_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if declared_len > MAX_FRAME_BYTES {
        return Err(Error::protocol(format!(
            "frame length {} exceeds cap of {}",
            declared_len, MAX_FRAME_BYTES
        )));
    }
    if declared_len as usize != payload.len() {
        return Err(Error::protocol(format!(
            "length prefix says {} bytes, got {}",
            declared_len,
            payload.len()
        )));
    }
    decode_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ButtonEvent, KeyEvent, MotionEvent};

    fn sample_messages() -> Vec<InputMessage> {
        vec![
            InputMessage::Keyboard {
                key_code: 0x04,
                event: KeyEvent::KeyDown,
                flags: 0x0010_0000,
            },
            InputMessage::MouseMotion {
                delta_x: -3.5,
                delta_y: 2.0,
                event: MotionEvent::Moved,
            },
            InputMessage::MouseButton {
                event: ButtonEvent::LeftDown,
                button_number: 0,
                click_state: 2,
            },
            InputMessage::Scroll {
                delta_x: 0.0,
                delta_y: -1.0,
                scroll_phase: 1,
                momentum_phase: 0,
            },
            InputMessage::ControlRelease,
            InputMessage::WarpCursor { x: 10.0, y: 20.0 },
            InputMessage::ScreenInfo {
                width: 1920.0,
                height: 1080.0,
                is_virtual: false,
                display_id: Some(1),
            },
        ]
    }

    #[test]
    fn decode_of_encode_is_identity() {
        for msg in sample_messages() {
            let frame = encode(&msg).expect("encode");
            let decoded = decode(&frame).expect("decode");
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn frame_header_matches_payload_length() {
        for msg in sample_messages() {
            let frame = encode(&msg).expect("encode");
            let declared = u32::from_be_bytes(frame[..4].try_into().unwrap());
            assert_eq!(declared as usize, frame.len() - 4);
        }
    }

    #[test]
    fn roundtrip_keyboard_event_scenario() {
        // A keyboard event roundtripped through the wire format.
        let msg = InputMessage::Keyboard {
            key_code: 0x04,
            event: KeyEvent::KeyDown,
            flags: 0x0010_0000,
        };
        let frame = encode(&msg).unwrap();
        assert_eq!(frame.len(), 4 + encode_payload(&msg).unwrap().len());
        assert_eq!(decode(&frame).unwrap(), msg);
    }

    #[test]
    fn truncated_frame_is_fatal_protocol_error() {
        let msg = InputMessage::ControlRelease;
        let mut frame = encode(&msg).unwrap();
        frame.truncate(frame.len() - 1);
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn oversize_declared_length_is_fatal() {
        let mut frame = vec![0xFFu8; 4];
        frame.extend_from_slice(b"{}");
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn unknown_discriminator_is_recoverable() {
        let payload = br#"{"kind":"TotallyNewMessage","foo":1}"#;
        let mut frame = Vec::new();
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        assert!(matches!(decode(&frame), Err(Error::UnknownVariant(_))));
    }

    #[test]
    fn garbage_payload_is_fatal_protocol_error() {
        let payload = b"not json at all";
        let mut frame = Vec::new();
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }
}
