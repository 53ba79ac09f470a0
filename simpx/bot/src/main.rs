//! simpx-bot - Example chat bot
//!
//! Connects to a running chat daemon and answers a few commands in direct
//! chats.
//!
//! # Usage
//!
//! ```bash
//! # Daemon on the default ws://localhost:5225
//! simpx-bot
//!
//! # Other daemon, other prefix
//! simpx-bot --url ws://10.0.0.2:5225 --prefix /
//!
//! # Verbose logging
//! RUST_LOG=debug simpx-bot
//! ```
//!
//! # Commands
//!
//! - `!echo <text>`: repeats the text
//! - `!square <number>`: squares a number
//! - `!add <a> <b>`: adds two integers (pattern command)
//! - `!info`: shows the bot's profile and address
//! - `!help [command]`: built in

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simpx_core::config::{default_config_path, load_config_from_path};
use simpx_core::{Bot, BoundArgs, Command, ConfigOverrides, Dispatcher, Param};
use tracing::{error, info};

const WELCOME: &str = "Hello {name}! I am a SimpleX bot. Send !help to see what I can do.";

/// Example SimpleX chat bot
#[derive(Parser, Debug)]
#[command(name = "simpx-bot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat daemon WebSocket URL
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "SIMPX_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command prefix
    #[arg(short = 'p', long)]
    prefix: Option<String>,

    /// Disable the built-in help command
    #[arg(long)]
    no_help: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SIMPX_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("simpx_bot={level},simpx_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Reply in the chat the command came from
async fn reply(args: &BoundArgs, text: String) -> Result<()> {
    let bot = args.bot().context("bot handle not bound")?;
    let chat = args.chat_info().context("chat not bound")?;
    bot.reply(chat, text).await?;
    Ok(())
}

fn square_text(input: &str) -> String {
    match input.trim().parse::<f64>() {
        Ok(n) => format!("{n} × {n} = {}", n * n),
        Err(_) => "Please provide a valid number to square.".to_owned(),
    }
}

fn add_text(a: &str, b: &str) -> String {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => match x.checked_add(y) {
            Some(sum) => format!("{a} + {b} = {sum}"),
            None => "That sum is too large.".to_owned(),
        },
        _ => "Please provide two integers.".to_owned(),
    }
}

fn commands() -> Vec<Command> {
    let chat = [Param::Bot, Param::ChatInfo];

    let echo = Command::exact("echo", |args: BoundArgs| async move {
        let text = format!("You said: {}", args.get("args").unwrap_or_default());
        reply(&args, text).await
    })
    .params(chat.clone())
    .param(Param::named_or("args", ""))
    .help("Echoes your message");

    let square = Command::exact("square", |args: BoundArgs| async move {
        let text = square_text(args.get("args").unwrap_or_default());
        reply(&args, text).await
    })
    .params(chat.clone())
    .param(Param::named_or("args", ""))
    .help("Calculates the square of a number");

    let add = Command::pattern("add", r"add (?P<a>\d+) (?P<b>\d+)", |args: BoundArgs| async move {
        let text = add_text(
            args.get("a").unwrap_or_default(),
            args.get("b").unwrap_or_default(),
        );
        reply(&args, text).await
    })
    .params(chat.clone())
    .params([Param::named("a"), Param::named("b")])
    .help("Adds two numbers");

    let info = Command::exact("info", |args: BoundArgs| async move {
        let client = args.client().context("client not bound")?;
        let user = client
            .api_get_active_user()
            .await?
            .context("no active user")?;
        let address = client.api_get_user_address().await?.unwrap_or_default();
        let text = format!(
            "*Bot Information*\nName: {}\nFull name: {}\nAddress: {address}",
            user.profile.display_name, user.profile.full_name
        );
        reply(&args, text).await
    })
    .params(chat)
    .param(Param::Client)
    .help("Shows bot information");

    vec![echo, square, add, info]
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("simpx-bot starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.url {
        overrides = overrides.with_url(url);
    }
    if let Some(prefix) = args.prefix {
        overrides = overrides.with_command_prefix(prefix);
    }
    if args.no_help {
        overrides = overrides.with_help_enabled(false);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(url = %config.transport.url, source = %config.source(), "Connecting to chat daemon");

    let client = simpx_core::ChatClient::connect(&config.transport)
        .await
        .with_context(|| format!("Failed to connect to {}", config.transport.url))?;

    let mut dispatcher = Dispatcher::builder()
        .prefix(config.command_prefix.clone())
        .help_enabled(config.help_enabled)
        .welcome_message(config.welcome_message.clone().unwrap_or_else(|| WELCOME.to_owned()));
    for command in commands() {
        dispatcher = dispatcher.command(command);
    }

    let bot = Bot::new(client, dispatcher).await?;
    info!(address = %bot.address(), "Bot ready");

    tokio::select! {
        () = bot.run() => {
            info!("Connection closed");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
        }
    }

    bot.close().await?;
    info!("simpx-bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_text() {
        assert_eq!(square_text(" 3 "), "3 × 3 = 9");
        assert_eq!(square_text("1.5"), "1.5 × 1.5 = 2.25");
        assert_eq!(square_text("x"), "Please provide a valid number to square.");
    }

    #[test]
    fn test_add_text() {
        assert_eq!(add_text("2", "3"), "2 + 3 = 5");
        assert_eq!(add_text("9223372036854775807", "1"), "That sum is too large.");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["simpx-bot", "--url", "ws://h:1", "--no-help"]);
        assert_eq!(args.url.as_deref(), Some("ws://h:1"));
        assert!(args.no_help);
        assert!(args.prefix.is_none());
    }
}
