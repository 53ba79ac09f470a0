//! Transport Layer
//!
//! Owns the duplex connection to the chat daemon.
//!
//! # Design Philosophy
//!
//! A transport does three things and nothing more:
//!
//! - runs a background reader that decodes inbound frames onto a bounded
//!   queue, closing that queue when the connection ends
//! - writes request envelopes under a timeout
//! - closes the connection, idempotently
//!
//! There is no reconnect logic here. A dropped connection shows up as a
//! closed queue and callers decide what to do about it.
//!
//! # Transport Types
//!
//! - **WebSocket** (feature `websocket`, on by default): the daemon's
//!   native endpoint, `ws://localhost:5225` unless configured otherwise
//! - **In-Process**: channel pair with a scripted daemon endpoint, for tests
//!   and embedding

pub mod config;
pub mod frame;
pub mod in_process;
mod reader;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use config::{ChatServer, TransportConfig};
pub use frame::{decode_frame, encode_request, MAX_FRAME_SIZE};
pub use in_process::{DaemonEndpoint, InProcessTransport};
pub use reader::WireFrame;
pub use traits::{ChatTransport, TransportError};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
