//! In-Process Transport
//!
//! Channel-backed transport whose far end is a [`DaemonEndpoint`] held by
//! the caller. Frames still go through the JSON codec and the shared reader
//! task, so everything above the transport behaves exactly as it does over
//! a WebSocket. Used for tests and for embedding a scripted daemon.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, mut daemon) = InProcessTransport::new_pair(&TransportConfig::default());
//! let client = ChatClient::new(Arc::new(transport), 16);
//!
//! // Answer the first request
//! let request = daemon.next_request().await.unwrap();
//! daemon.respond(&request.corr_id, json!({"type": "cmdOk"})).await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::protocol::{ChatSrvRequest, CorrId, InboundFrame};
use crate::queue::{BoundedQueue, QueueClosed};

use super::config::TransportConfig;
use super::frame::encode_request;
use super::reader::{close_queue, spawn_reader, WireFrame};
use super::traits::{ChatTransport, TransportError};

/// In-process transport using tokio channels
pub struct InProcessTransport {
    /// Encoded requests towards the endpoint
    outbound: mpsc::Sender<String>,
    /// Decoded frames from the reader task
    inbound: Arc<BoundedQueue<InboundFrame>>,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    write_timeout: Duration,
    write_timeout_ms: u64,
}

/// The daemon side of an [`InProcessTransport`]
///
/// Dropping it (or calling [`DaemonEndpoint::disconnect`]) ends the
/// connection as seen by the client.
pub struct DaemonEndpoint {
    requests: mpsc::Receiver<String>,
    frames: mpsc::Sender<WireFrame>,
}

impl InProcessTransport {
    /// Create a connected transport and the endpoint playing the daemon
    ///
    /// Both channels are bounded by `config.queue_capacity`, so a daemon that
    /// stops reading requests makes `write` time out. Must be called from
    /// within a tokio runtime, since the reader task starts immediately.
    #[must_use]
    pub fn new_pair(config: &TransportConfig) -> (Self, DaemonEndpoint) {
        let capacity = config.queue_capacity.max(1);
        let (req_tx, req_rx) = mpsc::channel(capacity);
        let (frame_tx, frame_rx) = mpsc::channel(capacity);

        let inbound = Arc::new(BoundedQueue::new(capacity));
        let connected = Arc::new(AtomicBool::new(true));
        let source = ReceiverStream::new(frame_rx).map(Ok);
        let reader = spawn_reader(source, inbound.clone(), connected.clone());

        let transport = Self {
            outbound: req_tx,
            inbound,
            connected,
            closed: AtomicBool::new(false),
            reader: parking_lot::Mutex::new(Some(reader)),
            write_timeout: config.write_timeout(),
            write_timeout_ms: config.write_timeout_ms,
        };
        let endpoint = DaemonEndpoint {
            requests: req_rx,
            frames: frame_tx,
        };
        (transport, endpoint)
    }
}

#[async_trait]
impl ChatTransport for InProcessTransport {
    async fn write(&self, request: &ChatSrvRequest) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed);
        }
        let text = encode_request(request)?;
        match tokio::time::timeout(self.write_timeout, self.outbound.send(text)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::Timeout {
                operation: "write",
                timeout_ms: self.write_timeout_ms,
            }),
        }
    }

    async fn read(&self) -> Result<InboundFrame, QueueClosed> {
        self.inbound.dequeue().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        close_queue(&self.inbound);
        debug!("In-process transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for InProcessTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

impl DaemonEndpoint {
    /// Next request written by the client, `None` once the client is gone
    ///
    /// Frames that are not valid request envelopes are skipped.
    pub async fn next_request(&mut self) -> Option<ChatSrvRequest> {
        while let Some(text) = self.requests.recv().await {
            match serde_json::from_str(&text) {
                Ok(request) => return Some(request),
                Err(e) => debug!(error = %e, "Skipping malformed request frame"),
            }
        }
        None
    }

    /// Send raw frame text to the client
    ///
    /// Returns `false` if the client side has gone away.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.frames.send(WireFrame::Text(text.into())).await.is_ok()
    }

    /// Send a binary frame to the client
    pub async fn send_binary(&self, data: Vec<u8>) -> bool {
        self.frames.send(WireFrame::Binary(data)).await.is_ok()
    }

    /// Answer a request
    pub async fn respond(&self, corr_id: &CorrId, resp: Value) -> bool {
        self.send_text(json!({"corrId": corr_id, "resp": resp}).to_string())
            .await
    }

    /// Push an unsolicited event
    pub async fn push_event(&self, resp: Value) -> bool {
        self.send_text(json!({"corrId": null, "resp": resp}).to_string())
            .await
    }

    /// Drop the connection
    pub fn disconnect(self) {}
}
