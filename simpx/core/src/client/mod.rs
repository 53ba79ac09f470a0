//! Correlation Client
//!
//! Multiplexes request/response pairs and unsolicited events over one
//! transport.
//!
//! # How it works
//!
//! ```text
//!  send_chat_cmd ──► [id + pending entry] ──► transport.write
//!                                                  │
//!  transport reader ─► inbound queue ─► demux task ┤
//!                                                  ├─ corrId known   → resolve waiter
//!                                                  ├─ corrId unknown → log, drop
//!                                                  └─ no corrId      → event queue
//! ```
//!
//! Ids come from a per-client counter (`1`, `2`, ...) and are allocated
//! together with their pending-table entry under one lock, so concurrent
//! callers never share an id. When the transport's queue closes, the demux
//! task fails every outstanding request with [`ClientError::ConnectionClosed`]
//! and closes the event queue.
//!
//! # Backpressure
//!
//! A full event queue holds back further events, never responses. While an
//! event waits for room the demux task keeps reading as long as some request
//! is outstanding, resolving responses and setting later events aside in
//! order. With no request outstanding it stops reading, and the transport's
//! own queue pushes back on the connection.

mod api;
pub mod error;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::{ChatCommand, ChatResponse, ChatSrvRequest, CorrId, InboundFrame};
use crate::queue::{BoundedQueue, QueueClosed};
use crate::transport::ChatTransport;

pub use api::{ConnReqType, ContactConnectionInfo};
pub use error::{ChatCommandError, ClientError, CorrelationError};

type Waiter = oneshot::Sender<Result<ChatResponse, ClientError>>;

/// Outstanding requests and the id counter
#[derive(Default)]
struct PendingTable {
    last_id: u64,
    waiters: HashMap<CorrId, Waiter>,
    /// Set once the demux task has exited
    closed: bool,
}

struct Inner {
    transport: Arc<dyn ChatTransport>,
    pending: Mutex<PendingTable>,
    events: Arc<BoundedQueue<ChatResponse>>,
    /// Signalled after a pending entry is added
    request_added: Notify,
    demux: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn has_waiters(&self) -> bool {
        !self.pending.lock().waiters.is_empty()
    }
}

/// Client for the chat daemon
///
/// Cheap to clone; clones share the connection, the pending table and the
/// event queue.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

/// Removes a pending entry if the request is abandoned before its response
struct PendingGuard<'a> {
    inner: &'a Inner,
    corr_id: CorrId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending.lock().waiters.remove(&self.corr_id);
    }
}

impl ChatClient {
    /// Wrap a connected transport and start the demux task
    ///
    /// `event_capacity` bounds the unsolicited-event queue. When it is full
    /// and no request is outstanding, the demux task stops reading, which
    /// applies backpressure to the transport reader. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, event_capacity: usize) -> Self {
        let inner = Arc::new(Inner {
            transport,
            pending: Mutex::new(PendingTable::default()),
            events: Arc::new(BoundedQueue::new(event_capacity)),
            request_added: Notify::new(),
            demux: Mutex::new(None),
        });
        let handle = tokio::spawn(demux(inner.clone()));
        *inner.demux.lock() = Some(handle);
        Self { inner }
    }

    /// Connect to a daemon over WebSocket
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the connection cannot be made.
    #[cfg(feature = "websocket")]
    pub async fn connect(config: &crate::transport::TransportConfig) -> Result<Self, ClientError> {
        let transport = crate::transport::WebSocketTransport::connect(config).await?;
        Ok(Self::new(Arc::new(transport), config.queue_capacity))
    }

    /// Send a command and wait for its response
    ///
    /// # Errors
    ///
    /// See [`ChatClient::send_chat_cmd_str`].
    pub async fn send_chat_cmd(&self, cmd: &ChatCommand) -> Result<ChatResponse, ClientError> {
        self.send_chat_cmd_str(cmd.to_string()).await
    }

    /// Send raw command text and wait for its response
    ///
    /// # Errors
    ///
    /// - `Transport` if the write fails or times out
    /// - `ConnectionClosed` if the connection ends first, or already has
    /// - `Correlation` if the matching response could not be decoded
    pub async fn send_chat_cmd_str(
        &self,
        cmd: impl Into<String>,
    ) -> Result<ChatResponse, ClientError> {
        let (tx, rx) = oneshot::channel();
        let corr_id = {
            let mut pending = self.inner.pending.lock();
            if pending.closed {
                return Err(ClientError::ConnectionClosed);
            }
            pending.last_id += 1;
            let corr_id = CorrId::from_counter(pending.last_id);
            pending.waiters.insert(corr_id.clone(), tx);
            corr_id
        };
        self.inner.request_added.notify_one();
        let _guard = PendingGuard {
            inner: &self.inner,
            corr_id: corr_id.clone(),
        };

        let request = ChatSrvRequest {
            corr_id,
            cmd: cmd.into(),
        };
        debug!(corr_id = %request.corr_id, cmd = %request.cmd, "Sending command");
        self.inner.transport.write(&request).await?;

        rx.await.unwrap_or(Err(ClientError::ConnectionClosed))
    }

    /// Next unsolicited event
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once the connection has ended and all
    /// earlier events were consumed.
    pub async fn next_event(&self) -> Result<ChatResponse, QueueClosed> {
        self.inner.events.dequeue().await
    }

    /// The unsolicited-event queue, for handing to a dispatcher
    #[must_use]
    pub fn events(&self) -> Arc<BoundedQueue<ChatResponse>> {
        self.inner.events.clone()
    }

    /// Number of requests still waiting for a response
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().waiters.len()
    }

    /// Whether the transport is still connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Close the connection and wait for the demux task to finish
    ///
    /// When this returns, every outstanding request has failed with
    /// `ConnectionClosed` and the event queue is closed. Events already
    /// queued stay readable; events not yet queued are dropped. Does not
    /// depend on anyone draining the event queue.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if closing the transport fails.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.inner.transport.close().await?;
        if self.inner.events.close_now().is_err() {
            trace!("Event queue already closed");
        }
        let handle = self.inner.demux.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Demux task ended abnormally");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("connected", &self.is_connected())
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

async fn demux(inner: Arc<Inner>) {
    let mut backlog: VecDeque<ChatResponse> = VecDeque::new();
    let mut reading = true;

    loop {
        let Some(event) = backlog.pop_front() else {
            if !reading {
                break;
            }
            match inner.transport.read().await {
                Ok(frame) => backlog.extend(route(&inner, frame)),
                Err(QueueClosed) => reading = false,
            }
            continue;
        };

        let enqueue = inner.events.enqueue(event);
        tokio::pin!(enqueue);
        let queued = loop {
            // Read past a full event queue only while a response may be behind it
            let read_ahead = reading && (backlog.is_empty() || inner.has_waiters());
            tokio::select! {
                biased;
                result = &mut enqueue => break result.is_ok(),
                frame = inner.transport.read(), if read_ahead => match frame {
                    Ok(frame) => backlog.extend(route(&inner, frame)),
                    Err(QueueClosed) => {
                        reading = false;
                        fail_pending(&inner);
                    }
                },
                () = inner.request_added.notified(), if reading && !read_ahead => {}
            }
        };
        if !queued {
            trace!("Event queue closed, dropping event");
        }
    }

    fail_pending(&inner);
    if inner.events.close_now().is_err() {
        trace!("Event queue already closed");
    }
    debug!("Demux task exited");
}

/// Fail every outstanding request and refuse new ones
fn fail_pending(inner: &Inner) {
    let abandoned = {
        let mut pending = inner.pending.lock();
        pending.closed = true;
        std::mem::take(&mut pending.waiters)
    };
    if !abandoned.is_empty() {
        debug!(count = abandoned.len(), "Failing outstanding requests");
    }
    for (_, waiter) in abandoned {
        // The caller may have given up already
        let _ = waiter.send(Err(ClientError::ConnectionClosed));
    }
}

/// Resolve a response, or hand back an event for the event queue
fn route(inner: &Inner, frame: InboundFrame) -> Option<ChatResponse> {
    match frame.corr_id {
        Some(corr_id) => {
            let waiter = inner.pending.lock().waiters.remove(&corr_id);
            let Some(waiter) = waiter else {
                warn!(corr_id = %corr_id, "Dropping response with no pending request");
                return None;
            };
            let result = frame.body.map_err(|source| {
                warn!(corr_id = %corr_id, error = %source, "Malformed response");
                ClientError::from(CorrelationError::Malformed {
                    corr_id: corr_id.clone(),
                    source,
                })
            });
            if waiter.send(result).is_err() {
                trace!(corr_id = %corr_id, "Caller stopped waiting");
            }
            None
        }
        None => match frame.body {
            Ok(event) => {
                trace!(tag = %event.tag(), "Queueing event");
                Some(event)
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable event frame");
                None
            }
        },
    }
}
