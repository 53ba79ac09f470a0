//! Event/Command Dispatcher
//!
//! Consumes unsolicited events from the client's event queue and routes them:
//!
//! 1. every event handler registered for the event's tag runs, in
//!    registration order;
//! 2. for `newChatItems`, each direct-chat message that starts with the
//!    command prefix is parsed as a command line and at most one command
//!    handler runs (exact name first, then patterns in registration order).
//!
//! Handlers run one at a time. A failing or panicking handler is logged and
//! counted in the [`DispatchOutcome`]; it never stops the loop. The loop ends
//! when the event queue closes.

mod binding;
mod command;
mod handler;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::client::{ChatClient, ClientError};
use crate::protocol::{ci_content_text, AChatItem, ChatInfo, ChatResponse};
use crate::queue::BoundedQueue;

pub use binding::{BoundArgs, Param};
pub use command::{Command, MatchKind, ARGS};
pub use handler::{BotHandle, CommandHandler, EventHandler};

use binding::{bind, HandlerContext};
use command::{CommandRegistry, HelpCommand, HELP_TEXT};
use handler::WelcomeHandler;

/// Default command prefix
pub const DEFAULT_PREFIX: &str = "!";

/// Tag of the event carrying new messages
pub const NEW_CHAT_ITEMS: &str = "newChatItems";

/// Tag of the event sent when a contact connects
pub const CONTACT_CONNECTED: &str = "contactConnected";

/// Dispatcher errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A command pattern failed to compile
    #[error("invalid command pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as registered
        pattern: String,
        /// Compiler error
        #[source]
        source: regex::Error,
    },

    /// A command handler declared a required value that was not supplied
    #[error("missing value for parameter `{0}`")]
    MissingParam(String),

    /// The handler needs a client but the dispatcher has none
    #[error("no chat client attached to the dispatcher")]
    NoClient,

    /// Replies are only possible in direct and group chats
    #[error("cannot reply in this kind of chat")]
    UnsupportedChat,

    /// Client request failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A handler returned an error
    #[error("{0:#}")]
    Handler(anyhow::Error),

    /// A handler panicked
    #[error("handler panicked: {0}")]
    HandlerPanic(String),
}

/// Dispatcher loop states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherState {
    /// Built, loop not started
    Idle,
    /// Waiting for the next event
    AwaitingEvent,
    /// Running handlers for an event
    Dispatching,
    /// Event queue closed; the loop has exited
    Closed,
}

/// A command that fired
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Registered command name
    pub command: String,
    /// How the line was matched
    pub kind: MatchKind,
    /// Whether binding and the handler both succeeded
    pub succeeded: bool,
}

/// What dispatching one event did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Event tag
    pub tag: String,
    /// Event handlers run
    pub handlers_run: usize,
    /// Event handlers that failed or panicked
    pub handler_failures: usize,
    /// Whether any event handler is registered for the tag
    pub has_handlers: bool,
    /// Commands fired, one per matching message
    pub commands: Vec<CommandOutcome>,
}

/// Configures and builds a [`Dispatcher`]
pub struct DispatcherBuilder {
    prefix: String,
    help_enabled: bool,
    welcome_message: Option<String>,
    client: Option<ChatClient>,
    events: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    contact_connected: Option<Arc<dyn EventHandler>>,
    commands: Vec<Command>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            help_enabled: true,
            welcome_message: None,
            client: None,
            events: HashMap::new(),
            contact_connected: None,
            commands: Vec::new(),
        }
    }
}

impl DispatcherBuilder {
    /// Builder with the default prefix and the help command enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Command prefix
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable or disable the built-in `help` command
    #[must_use]
    pub fn help_enabled(mut self, enabled: bool) -> Self {
        self.help_enabled = enabled;
        self
    }

    /// Message sent to each new contact; `{name}` is replaced with their
    /// display name
    #[must_use]
    pub fn welcome_message(mut self, template: impl Into<String>) -> Self {
        self.welcome_message = Some(template.into());
        self
    }

    /// Client handlers use to act on the daemon
    #[must_use]
    pub fn client(mut self, client: ChatClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Add a handler for events with `tag`
    #[must_use]
    pub fn on_event(mut self, tag: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.events
            .entry(tag.into())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Replace the welcome message with a custom `contactConnected` handler
    #[must_use]
    pub fn on_contact_connected(mut self, handler: impl EventHandler + 'static) -> Self {
        self.contact_connected = Some(Arc::new(handler));
        self
    }

    /// Register a command
    #[must_use]
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Compile the command table
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidPattern`] if a pattern does not compile.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let Self {
            prefix,
            help_enabled,
            welcome_message,
            client,
            mut events,
            contact_connected,
            commands,
        } = self;

        let mut registry = CommandRegistry::default();
        for command in commands {
            registry.register(command)?;
        }

        if help_enabled && !registry.has_exact("help") {
            let mut texts = registry.help_texts().clone();
            texts.insert("help".to_owned(), HELP_TEXT.to_owned());
            let help = Command::exact("help", HelpCommand { texts })
                .params([Param::Bot, Param::ChatInfo, Param::named_or(ARGS, "")])
                .help(HELP_TEXT);
            registry.register(help)?;
        }

        let greeter: Option<Arc<dyn EventHandler>> = match (contact_connected, welcome_message) {
            (Some(custom), _) => Some(custom),
            (None, Some(template)) => Some(Arc::new(WelcomeHandler { template })),
            (None, None) => None,
        };
        if let Some(greeter) = greeter {
            events
                .entry(CONTACT_CONNECTED.to_owned())
                .or_default()
                .push(greeter);
        }

        debug!(
            prefix = %prefix,
            commands = registry.len(),
            event_tags = events.len(),
            "Dispatcher built"
        );

        Ok(Dispatcher {
            bot: BotHandle::new(client, &prefix),
            prefix,
            events,
            commands: registry,
            state: Mutex::new(DispatcherState::Idle),
        })
    }
}

/// Routes events to handlers; immutable once built
pub struct Dispatcher {
    prefix: String,
    bot: BotHandle,
    events: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    commands: CommandRegistry,
    state: Mutex<DispatcherState>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("prefix", &self.prefix)
            .field("event_tags", &self.events.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Run a handler future, turning errors and panics into a `DispatchError`
async fn isolate<F>(fut: F) -> Result<(), DispatchError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DispatchError::Handler(e)),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            Err(DispatchError::HandlerPanic(message))
        }
    }
}

impl Dispatcher {
    /// Start configuring a dispatcher
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Current loop state
    #[must_use]
    pub fn state(&self) -> DispatcherState {
        *self.state.lock()
    }

    /// The handle passed to handlers
    #[must_use]
    pub fn bot(&self) -> &BotHandle {
        &self.bot
    }

    /// Whether any handler is registered for `tag`
    #[must_use]
    pub fn has_handlers(&self, tag: &str) -> bool {
        self.events.get(tag).is_some_and(|h| !h.is_empty())
    }

    fn set_state(&self, state: DispatcherState) {
        *self.state.lock() = state;
    }

    /// Dispatch events until `events` closes
    pub async fn run(&self, events: &BoundedQueue<ChatResponse>) {
        info!(prefix = %self.prefix, "Dispatcher started");
        loop {
            self.set_state(DispatcherState::AwaitingEvent);
            let Ok(event) = events.dequeue().await else {
                break;
            };
            self.set_state(DispatcherState::Dispatching);
            let outcome = self.dispatch_event(event).await;
            trace!(
                tag = %outcome.tag,
                handlers = outcome.handlers_run,
                failures = outcome.handler_failures,
                commands = outcome.commands.len(),
                "Event dispatched"
            );
        }
        self.set_state(DispatcherState::Closed);
        info!("Event queue closed, dispatcher stopped");
    }

    /// Run the handlers for one event
    pub async fn dispatch_event(&self, event: ChatResponse) -> DispatchOutcome {
        let mut outcome = DispatchOutcome {
            tag: event.tag().to_owned(),
            ..DispatchOutcome::default()
        };

        if let Some(handlers) = self.events.get(&outcome.tag) {
            outcome.has_handlers = !handlers.is_empty();
            for handler in handlers {
                outcome.handlers_run += 1;
                let result = isolate(handler.handle(event.clone(), self.bot.clone())).await;
                if let Err(e) = result {
                    outcome.handler_failures += 1;
                    warn!(tag = %outcome.tag, error = %e, "Event handler failed");
                }
            }
        } else {
            trace!(tag = %outcome.tag, "No event handlers");
        }

        if let ChatResponse::NewChatItems { chat_items } = &event {
            for item in chat_items {
                if let Some(fired) = self.dispatch_command(item).await {
                    outcome.commands.push(fired);
                }
            }
        }
        outcome
    }

    async fn dispatch_command(&self, item: &AChatItem) -> Option<CommandOutcome> {
        if !matches!(item.chat_info, ChatInfo::Direct { .. }) {
            return None;
        }
        let text = ci_content_text(&item.chat_item)?;
        let line = text.strip_prefix(self.prefix.as_str())?;
        let resolved = self.commands.resolve(line)?;
        let registration = resolved.registration;

        debug!(command = %registration.name, kind = ?resolved.kind, "Command matched");

        let ctx = HandlerContext {
            chat_info: &item.chat_info,
            chat_item: &item.chat_item,
            bot: &self.bot,
            values: resolved.values,
        };
        let result = match bind(&registration.params, ctx) {
            Ok(args) => isolate(registration.handler.call(args)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(command = %registration.name, error = %e, "Command handler failed");
        }

        Some(CommandOutcome {
            command: registration.name.clone(),
            kind: resolved.kind,
            succeeded: result.is_ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InProcessTransport, TransportConfig};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Calls = Arc<Mutex<Vec<String>>>;

    fn message(chat: Value, text: &str) -> ChatResponse {
        ChatResponse::from_value(json!({
            "type": "newChatItems",
            "chatItems": [{
                "chatInfo": chat,
                "chatItem": {
                    "content": {"type": "rcvMsgContent", "msgContent": {"type": "text", "text": text}}
                }
            }]
        }))
        .unwrap()
    }

    fn direct(text: &str) -> ChatResponse {
        message(
            json!({
                "type": "direct",
                "contact": {"contactId": 7, "localDisplayName": "alice", "profile": {"displayName": "alice"}}
            }),
            text,
        )
    }

    fn recorder(calls: &Calls, label: &'static str) -> impl CommandHandler + 'static {
        let calls = calls.clone();
        move |args: BoundArgs| {
            let calls = calls.clone();
            async move {
                let mut line = label.to_owned();
                for key in ["args", "a", "b"] {
                    if let Some(v) = args.get(key) {
                        line.push_str(&format!(" {key}={v}"));
                    }
                }
                calls.lock().push(line);
                anyhow::Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_exact_takes_precedence_over_pattern() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::builder()
            .command(
                Command::pattern("add", r"add (?P<a>\d+) (?P<b>\d+)", recorder(&calls, "pattern"))
                    .params([Param::named("a"), Param::named("b")]),
            )
            .command(Command::exact("add", recorder(&calls, "exact")).param(Param::named("args")))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch_event(direct("!add 2 3")).await;
        assert_eq!(
            outcome.commands,
            vec![CommandOutcome {
                command: "add".into(),
                kind: MatchKind::Exact,
                succeeded: true,
            }]
        );
        assert_eq!(*calls.lock(), vec!["exact args=2 3".to_owned()]);
    }

    #[tokio::test]
    async fn test_pattern_binding() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::builder()
            .command(
                Command::pattern("add", r"add (?P<a>\d+) (?P<b>\d+)", recorder(&calls, "add"))
                    .params([Param::named("a"), Param::named("b")]),
            )
            .build()
            .unwrap();

        dispatcher.dispatch_event(direct("!add 2 3")).await;
        let outcome = dispatcher.dispatch_event(direct("!add foo bar")).await;
        assert!(outcome.commands.is_empty());
        assert_eq!(*calls.lock(), vec!["add a=2 b=3".to_owned()]);
    }

    #[tokio::test]
    async fn test_lines_without_prefix_or_outside_direct_chats_are_ignored() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::builder()
            .help_enabled(false)
            .command(Command::exact("ping", recorder(&calls, "ping")))
            .build()
            .unwrap();

        dispatcher.dispatch_event(direct("ping")).await;
        dispatcher.dispatch_event(direct("!unknown")).await;
        dispatcher
            .dispatch_event(message(
                json!({"type": "group", "groupInfo": {"groupId": 1, "localDisplayName": "g", "groupProfile": {"displayName": "g"}}}),
                "!ping",
            ))
            .await;
        assert!(calls.lock().is_empty());

        dispatcher.dispatch_event(direct("!PING")).await;
        assert_eq!(*calls.lock(), vec!["ping".to_owned()]);
    }

    async fn failing(_: ChatResponse, _: BotHandle) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }

    async fn panicking(_: ChatResponse, _: BotHandle) -> anyhow::Result<()> {
        panic!("handler panic")
    }

    #[tokio::test]
    async fn test_event_handler_failures_are_isolated() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_after = ran.clone();
        let dispatcher = Dispatcher::builder()
            .on_event("newEvent", failing)
            .on_event("newEvent", panicking)
            .on_event("newEvent", move |event: ChatResponse, _: BotHandle| {
                let ran = ran_after.clone();
                async move {
                    assert_eq!(event.tag(), "newEvent");
                    ran.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .build()
            .unwrap();

        let event = ChatResponse::from_value(json!({"type": "newEvent", "value": 42})).unwrap();
        let outcome = dispatcher.dispatch_event(event.clone()).await;
        assert_eq!(outcome.tag, "newEvent");
        assert!(outcome.has_handlers);
        assert_eq!(outcome.handlers_run, 3);
        assert_eq!(outcome.handler_failures, 2);

        // Next cycle still runs
        dispatcher.dispatch_event(event).await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unhandled_tag() {
        let dispatcher = Dispatcher::builder().build().unwrap();
        let event = ChatResponse::from_value(json!({"type": "rcvFileStart"})).unwrap();
        let outcome = dispatcher.dispatch_event(event).await;
        assert!(!outcome.has_handlers);
        assert_eq!(outcome.handlers_run, 0);
        assert!(!dispatcher.has_handlers("rcvFileStart"));
    }

    #[tokio::test]
    async fn test_missing_param_counts_as_failure() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::builder()
            .command(Command::exact("needs", recorder(&calls, "needs")).param(Param::named("who")))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch_event(direct("!needs")).await;
        assert!(!outcome.commands[0].succeeded);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_exits_when_queue_closes() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let dispatcher = Arc::new(
            Dispatcher::builder()
                .on_event("tick", move |_: ChatResponse, _: BotHandle| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        anyhow::Ok(())
                    }
                })
                .build()
                .unwrap(),
        );
        assert_eq!(dispatcher.state(), DispatcherState::Idle);

        let queue = Arc::new(BoundedQueue::new(4));
        let task = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let queue = queue.clone();
            async move { dispatcher.run(&queue).await }
        });

        for _ in 0..3 {
            let tick = ChatResponse::from_value(json!({"type": "tick"})).unwrap();
            queue.enqueue(tick).await.unwrap();
        }
        queue.close().await.unwrap();
        task.await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.state(), DispatcherState::Closed);
    }

    #[tokio::test]
    async fn test_help_and_welcome_reply_through_client() {
        let (transport, mut daemon) = InProcessTransport::new_pair(&TransportConfig::default());
        let client = ChatClient::new(Arc::new(transport), 4);
        let dispatcher = Dispatcher::builder()
            .client(client.clone())
            .welcome_message("Hello {name}!")
            .command(Command::exact("echo", recorder(&Calls::default(), "echo")).help("Echoes text back. Any text"))
            .build()
            .unwrap();

        let daemon_task = tokio::spawn(async move {
            let mut commands = Vec::new();
            for _ in 0..2 {
                let request = daemon.next_request().await.unwrap();
                commands.push(request.cmd.clone());
                daemon
                    .respond(&request.corr_id, json!({"type": "newChatItems", "chatItems": []}))
                    .await;
            }
            commands
        });

        let outcome = dispatcher.dispatch_event(direct("!help")).await;
        assert!(outcome.commands[0].succeeded);

        let connected = ChatResponse::from_value(json!({
            "type": "contactConnected",
            "contact": {"contactId": 7, "localDisplayName": "alice", "profile": {"displayName": "alice"}}
        }))
        .unwrap();
        let outcome = dispatcher.dispatch_event(connected).await;
        assert_eq!(outcome.handler_failures, 0);

        let commands = daemon_task.await.unwrap();
        let help = r#"/_send @7 json [{"msgContent":{"type":"text","text":"Available commands:\n**!echo** - Echoes text back.\n**!help** - Shows this help message."}}]"#;
        let welcome = r#"/_send @7 json [{"msgContent":{"type":"text","text":"Hello alice!"}}]"#;
        assert_eq!(commands, vec![help.to_owned(), welcome.to_owned()]);
    }
}
