//! Reader Task
//!
//! The loop shared by every transport: pull raw frames from the connection,
//! decode them and push them onto the inbound queue until the connection
//! ends, then close the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::{FrameError, InboundFrame};
use crate::queue::BoundedQueue;

use super::frame::decode_frame;
use super::TransportError;

/// A message as it came off the connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireFrame {
    /// Text frame carrying a JSON envelope
    Text(String),
    /// Binary frame, which the daemon never legitimately sends
    Binary(Vec<u8>),
}

/// Spawn the reader task for a connection
///
/// The task stops when the source ends or errors, or when the queue's
/// enqueue side is closed by someone else. On the way out it marks the
/// connection as down and closes the queue if nobody has yet.
pub(crate) fn spawn_reader<S>(
    mut source: S,
    queue: Arc<BoundedQueue<InboundFrame>>,
    connected: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: Stream<Item = Result<WireFrame, TransportError>> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        while let Some(next) = source.next().await {
            let frame = match next {
                Ok(WireFrame::Text(text)) => decode_frame(&text),
                Ok(WireFrame::Binary(data)) => {
                    debug!(len = data.len(), "Received binary frame");
                    InboundFrame::error(FrameError::NotText)
                }
                Err(TransportError::ConnectionClosed) => {
                    debug!("Peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Transport read failed");
                    break;
                }
            };

            trace!(corr_id = ?frame.corr_id, "Frame received");
            if queue.enqueue(frame).await.is_err() {
                debug!("Inbound queue closed, stopping reader");
                break;
            }
        }

        connected.store(false, Ordering::SeqCst);
        close_queue(&queue);
        debug!("Reader task exited");
    })
}

/// Close the inbound queue without waiting for room, tolerating a close
/// that already happened
pub(crate) fn close_queue(queue: &BoundedQueue<InboundFrame>) {
    if queue.close_now().is_err() {
        trace!("Inbound queue already closed");
    }
}
