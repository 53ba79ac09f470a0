//! Client errors

use crate::protocol::{ChatResponse, CorrId, FrameError};
use crate::transport::TransportError;

/// A response could not be delivered to the request waiting for it
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    /// The frame carried our correlation id but its body did not decode
    #[error("malformed response to request {corr_id}: {source}")]
    Malformed {
        /// Id of the failed request
        corr_id: CorrId,
        /// Why the body could not be decoded
        #[source]
        source: FrameError,
    },
}

/// The daemon answered, but not with a response this command expects
#[derive(Debug, thiserror::Error)]
#[error("{message}: unexpected `{}` response", .response.tag())]
pub struct ChatCommandError {
    /// What the client was trying to do
    pub message: String,
    /// The response actually received
    pub response: Box<ChatResponse>,
}

impl ChatCommandError {
    /// Wrap an unexpected response
    #[must_use]
    pub fn new(message: impl Into<String>, response: ChatResponse) -> Self {
        Self {
            message: message.into(),
            response: Box::new(response),
        }
    }
}

/// Errors returned to callers issuing requests
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Writing the request failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connection ended before a response arrived
    #[error("connection closed")]
    ConnectionClosed,

    /// A response arrived for this request but was unusable
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The daemon answered with an unexpected response
    #[error(transparent)]
    Command(#[from] ChatCommandError),
}

impl ClientError {
    /// The unexpected daemon response, if that is what this error is
    #[must_use]
    pub fn response(&self) -> Option<&ChatResponse> {
        match self {
            Self::Command(e) => Some(&e.response),
            _ => None,
        }
    }

    /// Whether the failure was a lost connection rather than a bad answer
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Transport(TransportError::ConnectionClosed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_message() {
        let err = ChatCommandError::new("Error loading chat", ChatResponse::CmdOk {});
        assert_eq!(err.to_string(), "Error loading chat: unexpected `cmdOk` response");

        let err = ClientError::from(err);
        assert_eq!(err.response(), Some(&ChatResponse::CmdOk {}));
        assert!(!err.is_connection_lost());
    }

    #[test]
    fn test_connection_lost() {
        assert!(ClientError::ConnectionClosed.is_connection_lost());
        assert!(ClientError::from(TransportError::ConnectionClosed).is_connection_lost());
    }
}
