//! WebSocket Transport
//!
//! Connects to the chat daemon's WebSocket endpoint with `tokio-tungstenite`.
//! The stream half feeds the shared reader task; the sink half sits behind
//! an async mutex so concurrent requests serialize their writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{future, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::protocol::{ChatSrvRequest, InboundFrame};
use crate::queue::{BoundedQueue, QueueClosed};

use super::config::TransportConfig;
use super::frame::encode_request;
use super::reader::{close_queue, spawn_reader, WireFrame};
use super::traits::{ChatTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to a chat daemon
pub struct WebSocketTransport {
    sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    inbound: Arc<BoundedQueue<InboundFrame>>,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    write_timeout: Duration,
    write_timeout_ms: u64,
}

fn ws_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::ConnectionClosed
        }
        tungstenite::Error::Io(e) => TransportError::Io(e),
        other => TransportError::Protocol(other.to_string()),
    }
}

impl WebSocketTransport {
    /// Connect to `config.url` and start the reader task
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Timeout` if the handshake does not finish
    /// within `config.connect_timeout_ms`, or `ConnectionFailed` if it fails.
    pub async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let handshake = tokio_tungstenite::connect_async(config.url.as_str());
        let (ws, _response) = tokio::time::timeout(config.connect_timeout(), handshake)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "connect",
                timeout_ms: config.connect_timeout_ms,
            })?
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {e}", config.url)))?;

        info!(url = %config.url, "Connected to chat daemon");

        let (sink, stream) = ws.split();
        let source = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(WireFrame::Text(text))),
                Ok(Message::Binary(data)) => Some(Ok(WireFrame::Binary(data))),
                Ok(Message::Close(_)) => Some(Err(TransportError::ConnectionClosed)),
                // tungstenite answers pings itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(ws_error(e))),
            })
        });

        let inbound = Arc::new(BoundedQueue::new(config.queue_capacity));
        let connected = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(source, inbound.clone(), connected.clone());

        Ok(Self {
            sink: tokio::sync::Mutex::new(sink),
            inbound,
            connected,
            closed: AtomicBool::new(false),
            reader: parking_lot::Mutex::new(Some(reader)),
            write_timeout: config.write_timeout(),
            write_timeout_ms: config.write_timeout_ms,
        })
    }
}

#[async_trait]
impl ChatTransport for WebSocketTransport {
    async fn write(&self, request: &ChatSrvRequest) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed);
        }
        let text = encode_request(request)?;
        let send = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(text)).await
        };
        match tokio::time::timeout(self.write_timeout, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ws_error(e)),
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

        let goodbye = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(self.write_timeout, goodbye).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "WebSocket close handshake failed"),
            Err(_) => debug!("WebSocket close handshake timed out"),
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        close_queue(&self.inbound);
        info!("Disconnected from chat daemon");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChatResponse, CorrId};
    use tokio::net::TcpListener;

    /// One-connection daemon that answers every request with `cmdOk`,
    /// after pushing a single event.
    async fn spawn_daemon() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"corrId":null,"resp":{"type":"hello"}}"#.into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let req: ChatSrvRequest = serde_json::from_str(&text).unwrap();
                    let reply = format!(
                        r#"{{"corrId":"{}","resp":{{"type":"cmdOk"}}}}"#,
                        req.corr_id
                    );
                    ws.send(Message::Text(reply)).await.unwrap();
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_round_trip_over_websocket() {
        let url = spawn_daemon().await;
        let config = TransportConfig {
            url,
            ..TransportConfig::default()
        };
        let transport = WebSocketTransport::connect(&config).await.unwrap();
        assert!(transport.is_connected());

        let event = transport.read().await.unwrap();
        assert!(event.is_event());
        assert_eq!(event.body.unwrap().tag(), "hello");

        transport
            .write(&ChatSrvRequest {
                corr_id: CorrId::from_counter(1),
                cmd: "/u".into(),
            })
            .await
            .unwrap();
        let reply = transport.read().await.unwrap();
        assert_eq!(reply.corr_id, Some(CorrId::from("1")));
        assert_eq!(reply.body.unwrap(), ChatResponse::CmdOk {});

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(transport.read().await.unwrap_err(), QueueClosed);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = TransportConfig {
            url: format!("ws://{addr}"),
            connect_timeout_ms: 1000,
            ..TransportConfig::default()
        };
        let err = WebSocketTransport::connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            TransportError::ConnectionFailed(_) | TransportError::Timeout { .. }
        ));
    }
}
