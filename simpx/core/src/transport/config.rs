//! Transport Configuration
//!
//! Endpoint, timeouts and queue capacity for a daemon connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Default daemon host
pub const DEFAULT_HOST: &str = "localhost";

/// Default daemon WebSocket port
pub const DEFAULT_PORT: u16 = 5225;

/// Default connect and write timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 4000;

/// Host and port of a chat daemon
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatServer {
    /// Host name or address
    pub host: String,
    /// WebSocket port
    pub port: u16,
}

impl Default for ChatServer {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl ChatServer {
    /// Server on the default port
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
        }
    }

    /// WebSocket URL for this server
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Daemon WebSocket URL
    pub url: String,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Write timeout in milliseconds
    ///
    /// A write the peer has not accepted within this window fails with
    /// `TransportError::Timeout`.
    pub write_timeout_ms: u64,

    /// Capacity of the inbound frame queue and the client's event queue
    pub queue_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: ChatServer::default().url(),
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TransportConfig {
    /// Configuration for a given server with default tunables
    #[must_use]
    pub fn for_server(server: &ChatServer) -> Self {
        Self {
            url: server.url(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SIMPX_SERVER_URL`: Daemon WebSocket URL
    /// - `SIMPX_CONNECT_TIMEOUT`: Connection timeout in ms
    /// - `SIMPX_WRITE_TIMEOUT`: Write timeout in ms
    /// - `SIMPX_QUEUE_CAPACITY`: Inbound queue capacity
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay the `SIMPX_*` variables found by `var`
    ///
    /// Unparsable numbers are ignored. Returns whether any field changed.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> bool {
        let mut changed = false;
        if let Some(url) = var("SIMPX_SERVER_URL") {
            self.url = url;
            changed = true;
        }
        if let Some(ms) = var("SIMPX_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = ms;
            changed = true;
        }
        if let Some(ms) = var("SIMPX_WRITE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.write_timeout_ms = ms;
            changed = true;
        }
        if let Some(capacity) = var("SIMPX_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.queue_capacity = capacity;
            changed = true;
        }
        changed
    }

    /// Connection timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Write timeout as a `Duration`
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.url, "ws://localhost:5225");
        assert_eq!(config.connect_timeout_ms, 4000);
        assert_eq!(config.write_timeout(), Duration::from_secs(4));
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_chat_server_url() {
        assert_eq!(ChatServer::new("10.0.0.2").url(), "ws://10.0.0.2:5225");
        let server = ChatServer {
            host: "example".into(),
            port: 6000,
        };
        assert_eq!(TransportConfig::for_server(&server).url, "ws://example:6000");
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [
            ("SIMPX_SERVER_URL", "ws://env:7"),
            ("SIMPX_WRITE_TIMEOUT", "250"),
            ("SIMPX_QUEUE_CAPACITY", "many"),
        ]
        .into_iter()
        .collect();

        let mut config = TransportConfig::default();
        assert!(config.apply_env(|key| env.get(key).map(|v| (*v).to_owned())));
        assert_eq!(config.url, "ws://env:7");
        assert_eq!(config.write_timeout_ms, 250);
        assert_eq!(config.connect_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);

        let mut untouched = TransportConfig::default();
        assert!(!untouched.apply_env(|_| None));
        assert_eq!(untouched, TransportConfig::default());
    }
}
