//! Transport Traits
//!
//! The client only ever talks to a [`ChatTransport`]: it writes request
//! envelopes and reads decoded inbound frames that a background reader task
//! has already placed on the transport's bounded queue.

use async_trait::async_trait;

use crate::protocol::{ChatSrvRequest, InboundFrame};
use crate::queue::QueueClosed;

/// Errors that can occur during transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Connect or write did not finish in time
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// What timed out
        operation: &'static str,
        /// The configured limit
        timeout_ms: u64,
    },

    /// Request could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error from underlying transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Duplex connection to the chat daemon
///
/// Implementations own the physical connection and run a reader task that
/// decodes every inbound frame onto a bounded queue. When the connection
/// ends for any reason the queue is closed, so `read` fails with
/// [`QueueClosed`] instead of hanging.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one request envelope, bounded by the configured write timeout
    async fn write(&self, request: &ChatSrvRequest) -> Result<(), TransportError>;

    /// Next inbound frame, in arrival order
    async fn read(&self) -> Result<InboundFrame, QueueClosed>;

    /// Close the connection; calling it again is a no-op
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether the connection is still open
    fn is_connected(&self) -> bool;
}
