//! Request and response envelopes
//!
//! Outbound: `{"corrId": "<decimal>", "cmd": "<command text>"}`
//! Inbound:  `{"corrId": "<decimal>" | null, "resp": {"type": "<tag>", ...}}`

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::response::ChatResponse;

/// Client-assigned correlation id
///
/// Rendered as a decimal string on the wire; the daemon echoes it verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrId(String);

impl CorrId {
    /// Build an id from the client's counter value
    #[must_use]
    pub fn from_counter(n: u64) -> Self {
        Self(n.to_string())
    }

    /// The id as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for CorrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSrvRequest {
    /// Correlation id the response will carry
    pub corr_id: CorrId,
    /// Command in the daemon's text command language
    pub cmd: String,
}

/// Why an inbound frame could not be turned into a [`ChatResponse`]
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Frame text is not valid JSON
    #[error("invalid JSON frame: {0}")]
    InvalidJson(String),

    /// The WebSocket delivered a non-text frame
    #[error("WebSocket data is not a string")]
    NotText,

    /// Frame has no `resp` object or the response has no string `type`
    #[error("invalid response format: {0}")]
    MissingTag(String),

    /// Response was wrapped in an error (`Left`) envelope
    #[error("daemon returned an error envelope")]
    ErrorMarker(Value),

    /// Frame exceeds the size limit
    #[error("frame too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Frame size in bytes
        size: usize,
        /// Configured maximum
        max: usize,
    },
}

/// One decoded inbound frame
///
/// The correlation id survives even when the body could not be decoded, so
/// the client can still fail the request that was waiting for it.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    /// Correlation id, absent for unsolicited events
    pub corr_id: Option<CorrId>,
    /// Decoded response or the reason decoding failed
    pub body: Result<ChatResponse, FrameError>,
}

impl InboundFrame {
    /// Frame for a body that failed before any id could be read
    #[must_use]
    pub fn error(err: FrameError) -> Self {
        Self {
            corr_id: None,
            body: Err(err),
        }
    }

    /// Whether this frame is an unsolicited event
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.corr_id.is_none()
    }
}
