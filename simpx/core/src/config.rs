//! TOML Configuration File Support
//!
//! Bot configuration is read from `$XDG_CONFIG_HOME/simpx/bot.toml`
//! (typically `~/.config/simpx/bot.toml`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments, applied by the caller through [`ConfigOverrides`]
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! url = "ws://localhost:5225"
//! connect_timeout_ms = 4000
//! write_timeout_ms = 4000
//! queue_capacity = 16
//!
//! [bot]
//! command_prefix = "!"
//! help_enabled = true
//! welcome_message = "Hello {name}! Send !help to see what I can do."
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::DEFAULT_PREFIX;
use crate::transport::TransportConfig;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Where the effective configuration last changed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Daemon WebSocket URL
    pub url: Option<String>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Write timeout in milliseconds
    pub write_timeout_ms: Option<u64>,
    /// Inbound and event queue capacity
    pub queue_capacity: Option<usize>,
}

/// `[bot]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotToml {
    /// Prefix marking a message as a command
    pub command_prefix: Option<String>,
    /// Whether the built-in help command is registered
    pub help_enabled: Option<bool>,
    /// Greeting for new contacts, `{name}` is replaced
    pub welcome_message: Option<String>,
}

/// Root of the TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpxToml {
    /// Daemon connection
    pub server: ServerToml,
    /// Bot behavior
    pub bot: BotToml,
}

/// Effective configuration
#[derive(Clone, Debug)]
pub struct SimpxConfig {
    /// Connection settings
    pub transport: TransportConfig,
    /// Command prefix
    pub command_prefix: String,
    /// Whether the built-in help command is registered
    pub help_enabled: bool,
    /// Greeting for new contacts
    pub welcome_message: Option<String>,
    /// Path of the file that was loaded, if any
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for SimpxConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            command_prefix: DEFAULT_PREFIX.to_owned(),
            help_enabled: true,
            welcome_message: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SimpxConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the configuration last changed
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Record where the configuration last changed
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the runtime cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero queue capacity, a
    /// zero write timeout or an empty command prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.transport.write_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "write_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.command_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "command_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file path
///
/// `$XDG_CONFIG_HOME/simpx/bot.toml`, or `None` when no config directory is
/// known for this platform.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("simpx").join("bot.toml"))
}

/// Load configuration from the default file and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
/// A missing config file is not an error.
pub fn load_config() -> Result<SimpxConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from `path` and the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SimpxConfig, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn load_file(path: Option<PathBuf>) -> Result<SimpxConfig, ConfigError> {
    let mut config = SimpxConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(config);
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let toml_config: SimpxToml = toml::from_str(&content)?;
    apply_toml_config(&mut config, toml_config);
    config.config_file_path = Some(config_path.clone());
    config.source = ConfigSource::File;

    tracing::info!(path = %config_path.display(), "Loaded configuration from file");
    Ok(config)
}

fn apply_toml_config(config: &mut SimpxConfig, toml: SimpxToml) {
    let SimpxToml { server, bot } = toml;

    if let Some(url) = server.url {
        config.transport.url = url;
    }
    if let Some(timeout) = server.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(timeout) = server.write_timeout_ms {
        config.transport.write_timeout_ms = timeout;
    }
    if let Some(capacity) = server.queue_capacity {
        config.transport.queue_capacity = capacity;
    }

    if let Some(prefix) = bot.command_prefix {
        config.command_prefix = prefix;
    }
    if let Some(enabled) = bot.help_enabled {
        config.help_enabled = enabled;
    }
    if bot.welcome_message.is_some() {
        config.welcome_message = bot.welcome_message;
    }
}

/// Apply `SIMPX_*` variables; unparsable numbers are ignored
fn apply_env_config(config: &mut SimpxConfig, var: impl Fn(&str) -> Option<String>) {
    if config.transport.apply_env(var) {
        config.source = ConfigSource::Env;
    }
}

/// CLI overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Daemon URL
    pub url: Option<String>,
    /// Command prefix
    pub command_prefix: Option<String>,
    /// Welcome message
    pub welcome_message: Option<String>,
    /// Help command switch
    pub help_enabled: Option<bool>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the daemon URL
    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    /// Override the command prefix
    #[must_use]
    pub fn with_command_prefix(mut self, prefix: String) -> Self {
        self.command_prefix = Some(prefix);
        self
    }

    /// Override the welcome message
    #[must_use]
    pub fn with_welcome_message(mut self, message: String) -> Self {
        self.welcome_message = Some(message);
        self
    }

    /// Override the help command switch
    #[must_use]
    pub fn with_help_enabled(mut self, enabled: bool) -> Self {
        self.help_enabled = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut SimpxConfig) {
        if self.url.is_some()
            || self.command_prefix.is_some()
            || self.welcome_message.is_some()
            || self.help_enabled.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.url {
            config.transport.url.clone_from(url);
        }
        if let Some(ref prefix) = self.command_prefix {
            config.command_prefix.clone_from(prefix);
        }
        if let Some(ref message) = self.welcome_message {
            config.welcome_message = Some(message.clone());
        }
        if let Some(enabled) = self.help_enabled {
            config.help_enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SimpxConfig::default();
        assert_eq!(config.transport.url, "ws://localhost:5225");
        assert_eq!(config.transport.write_timeout_ms, 4000);
        assert_eq!(config.transport.queue_capacity, 16);
        assert_eq!(config.command_prefix, "!");
        assert!(config.help_enabled);
        assert!(config.welcome_message.is_none());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("simpx/bot.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = toml_file(
            r#"
[server]
url = "ws://10.0.0.2:6000"
connect_timeout_ms = 1500
queue_capacity = 64

[bot]
command_prefix = "/"
help_enabled = false
welcome_message = "Hi {name}"
"#,
        );
        let config = load_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.transport.url, "ws://10.0.0.2:6000");
        assert_eq!(config.transport.connect_timeout_ms, 1500);
        assert_eq!(config.transport.write_timeout_ms, 4000);
        assert_eq!(config.transport.queue_capacity, 64);
        assert_eq!(config.command_prefix, "/");
        assert!(!config.help_enabled);
        assert_eq!(config.welcome_message.as_deref(), Some("Hi {name}"));
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = toml_file("");
        let config = load_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("[server\nurl = 5");
        let err = load_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[server]\nurl = \"ws://file:1\"\nwrite_timeout_ms = 900\n");
        let mut config = load_file(Some(file.path().to_path_buf())).unwrap();

        let env: HashMap<&str, &str> = [
            ("SIMPX_SERVER_URL", "ws://env:2"),
            ("SIMPX_QUEUE_CAPACITY", "8"),
            ("SIMPX_CONNECT_TIMEOUT", "soon"),
        ]
        .into_iter()
        .collect();
        apply_env_config(&mut config, |key| env.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.transport.url, "ws://env:2");
        assert_eq!(config.transport.queue_capacity, 8);
        assert_eq!(config.transport.write_timeout_ms, 900);
        assert_eq!(config.transport.connect_timeout_ms, 4000);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = SimpxConfig::default();
        config.transport.url = "ws://env:2".into();
        config.set_source(ConfigSource::Env);

        ConfigOverrides::new()
            .with_url("ws://cli:3".into())
            .with_command_prefix("?".into())
            .apply(&mut config);

        assert_eq!(config.transport.url, "ws://cli:3");
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = SimpxConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_validation() {
        let mut config = SimpxConfig::default();
        config.transport.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = SimpxConfig::default();
        config.transport.write_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SimpxConfig::default();
        config.command_prefix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
