//! simpx Core - Client runtime for the SimpleX chat daemon
//!
//! Talks to a chat daemon over one duplex connection that carries both
//! replies to our commands and events the daemon pushes on its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌──────────────┐  events  ┌──────────────┐
//! │  Transport   │──────────►│  ChatClient  │─────────►│  Dispatcher  │
//! │ (WebSocket / │  bounded  │ corrId demux │  bounded │ event + cmd  │
//! │  in-process) │   queue   │ pending table│   queue  │   handlers   │
//! └──────▲───────┘           └──────┬───────┘          └──────┬───────┘
//!        │        requests          │                         │
//!        └──────────────────────────┴─────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`BoundedQueue`]: FIFO with backpressure and a one-shot close
//! - [`ChatTransport`]: the duplex connection; [`WebSocketTransport`] and
//!   [`InProcessTransport`] implement it
//! - [`ChatClient`]: correlates requests with responses and exposes the
//!   daemon's command API
//! - [`Dispatcher`]: routes events and `!command` messages to handlers
//! - [`Bot`]: client and dispatcher wired together
//!
//! # Quick Start
//!
//! ```ignore
//! use simpx_core::{Bot, BoundArgs, Command, Dispatcher, Param, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let echo = Command::exact("echo", |args: BoundArgs| async move {
//!         if let (Some(bot), Some(chat)) = (args.bot(), args.chat_info()) {
//!             bot.reply(chat, format!("You said: {}", args.get("args").unwrap_or(""))).await?;
//!         }
//!         anyhow::Ok(())
//!     })
//!     .params([Param::Bot, Param::ChatInfo, Param::named_or("args", "")])
//!     .help("Echoes your message");
//!
//!     let dispatcher = Dispatcher::builder()
//!         .welcome_message("Hello {name}!")
//!         .command(echo);
//!     Bot::start(&TransportConfig::default(), dispatcher).await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bot;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod queue;
pub mod transport;

pub use bot::{Bot, BotError};
pub use client::{ChatClient, ChatCommandError, ClientError, CorrelationError};
pub use config::{load_config, ConfigError, ConfigOverrides, ConfigSource, SimpxConfig};
pub use dispatch::{
    BotHandle, BoundArgs, Command, CommandHandler, DispatchError, DispatchOutcome, Dispatcher,
    DispatcherBuilder, DispatcherState, EventHandler, Param,
};
pub use protocol::{ChatCommand, ChatResponse, ChatType, CorrId};
pub use queue::{BoundedQueue, QueueClosed};
pub use transport::{ChatTransport, InProcessTransport, TransportConfig, TransportError};
#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;
