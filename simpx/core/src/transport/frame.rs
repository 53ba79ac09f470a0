//! Frame Codec
//!
//! Converts between envelopes and WebSocket text frames.
//!
//! # Inbound unwrapping
//!
//! The `resp` object may come wrapped in an either-style envelope:
//! `{"Right": {...}}` holds the real response, `{"Left": {...}}` marks a
//! daemon-side failure. Unwrapping happens before the tag is inspected.
//! Whatever goes wrong with the body, the `corrId` is still reported so the
//! waiting request can be failed.

use serde_json::Value;

use crate::protocol::{ChatResponse, ChatSrvRequest, CorrId, FrameError, InboundFrame};

use super::TransportError;

/// Maximum inbound frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Serialize a request into frame text
///
/// # Errors
///
/// Returns `TransportError::Serialization` if JSON encoding fails.
pub fn encode_request(request: &ChatSrvRequest) -> Result<String, TransportError> {
    Ok(serde_json::to_string(request)?)
}

/// Decode one inbound text frame
#[must_use]
pub fn decode_frame(text: &str) -> InboundFrame {
    if text.len() > MAX_FRAME_SIZE {
        return InboundFrame::error(FrameError::TooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return InboundFrame::error(FrameError::InvalidJson(e.to_string())),
    };

    let corr_id = match value.get("corrId") {
        Some(Value::String(id)) => Some(CorrId::from(id.as_str())),
        Some(Value::Number(n)) => Some(CorrId::from(n.to_string().as_str())),
        _ => None,
    };

    let body = match value.get_mut("resp").map(Value::take) {
        Some(resp) => unwrap_either(resp).and_then(ChatResponse::from_value),
        None => Err(FrameError::MissingTag("no `resp` object".into())),
    };

    InboundFrame { corr_id, body }
}

fn unwrap_either(mut resp: Value) -> Result<Value, FrameError> {
    if let Some(right) = resp.get_mut("Right") {
        return Ok(right.take());
    }
    if let Some(left) = resp.get_mut("Left") {
        return Err(FrameError::ErrorMarker(left.take()));
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_encode_request() {
        let req = ChatSrvRequest {
            corr_id: CorrId::from_counter(1),
            cmd: "/_stop".into(),
        };
        assert_eq!(encode_request(&req).unwrap(), r#"{"corrId":"1","cmd":"/_stop"}"#);
    }

    #[test]
    fn test_decode_response() {
        let frame = decode_frame(r#"{"corrId":"1","resp":{"type":"cmdOk"}}"#);
        assert_eq!(frame.corr_id, Some(CorrId::from("1")));
        assert_eq!(frame.body.unwrap(), ChatResponse::CmdOk {});
    }

    #[test]
    fn test_decode_event() {
        let frame = decode_frame(r#"{"corrId":null,"resp":{"type":"newEvent","value":42}}"#);
        assert!(frame.is_event());
        assert_eq!(
            frame.body.unwrap(),
            ChatResponse::Other(json!({"type": "newEvent", "value": 42}))
        );
    }

    #[test]
    fn test_decode_unwraps_right() {
        let frame = decode_frame(r#"{"corrId":"3","resp":{"Right":{"type":"chatStopped"}}}"#);
        assert_eq!(frame.body.unwrap(), ChatResponse::ChatStopped {});
    }

    #[test]
    fn test_decode_left_keeps_corr_id() {
        let frame = decode_frame(r#"{"corrId":"4","resp":{"Left":{"type":"chatError"}}}"#);
        assert_eq!(frame.corr_id, Some(CorrId::from("4")));
        assert_eq!(
            frame.body.unwrap_err(),
            FrameError::ErrorMarker(json!({"type": "chatError"}))
        );
    }

    #[test]
    fn test_decode_missing_type_keeps_corr_id() {
        let frame = decode_frame(r#"{"corrId":"5","resp":{"value":1}}"#);
        assert_eq!(frame.corr_id, Some(CorrId::from("5")));
        assert!(matches!(frame.body, Err(FrameError::MissingTag(_))));
    }

    #[test]
    fn test_decode_invalid_json() {
        let frame = decode_frame("not json");
        assert!(frame.corr_id.is_none());
        assert!(matches!(frame.body, Err(FrameError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_missing_resp() {
        let frame = decode_frame(r#"{"corrId":"2"}"#);
        assert_eq!(frame.corr_id, Some(CorrId::from("2")));
        assert!(matches!(frame.body, Err(FrameError::MissingTag(_))));
    }
}
