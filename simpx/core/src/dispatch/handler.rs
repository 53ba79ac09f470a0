//! Handler traits and the bot handle passed to handlers

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::client::ChatClient;
use crate::protocol::{AChatItem, ChatInfo, ChatResponse, ChatType};

use super::binding::BoundArgs;
use super::DispatchError;

/// Handles every event with a given tag
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event
    async fn handle(&self, event: ChatResponse, bot: BotHandle) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(ChatResponse, BotHandle) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: ChatResponse, bot: BotHandle) -> anyhow::Result<()> {
        self(event, bot).await
    }
}

/// Handles a command line
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command with the inputs it declared
    async fn call(&self, args: BoundArgs) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn call(&self, args: BoundArgs) -> anyhow::Result<()> {
        self(args).await
    }
}

/// What handlers get to act on the bot with
#[derive(Clone, Debug)]
pub struct BotHandle {
    client: Option<ChatClient>,
    prefix: Arc<str>,
}

impl BotHandle {
    pub(crate) fn new(client: Option<ChatClient>, prefix: &str) -> Self {
        Self {
            client,
            prefix: Arc::from(prefix),
        }
    }

    /// A handle with no client, for dispatchers that only route events
    #[must_use]
    pub fn detached(prefix: &str) -> Self {
        Self::new(None, prefix)
    }

    /// The chat client, if one is attached
    #[must_use]
    pub fn client(&self) -> Option<&ChatClient> {
        self.client.as_ref()
    }

    /// The command prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Send a text message to a chat
    ///
    /// # Errors
    ///
    /// Returns `NoClient` when no client is attached, or the client's error.
    pub async fn send_text(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        text: impl Into<String>,
    ) -> Result<Vec<AChatItem>, DispatchError> {
        let client = self.client.as_ref().ok_or(DispatchError::NoClient)?;
        Ok(client.api_send_text_message(chat_type, chat_id, text).await?)
    }

    /// Reply in the chat a message came from
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedChat` for chats other than direct and group chats.
    pub async fn reply(
        &self,
        chat_info: &ChatInfo,
        text: impl Into<String>,
    ) -> Result<Vec<AChatItem>, DispatchError> {
        let (chat_type, chat_id) = match chat_info {
            ChatInfo::Direct { contact } => (ChatType::Direct, contact.contact_id),
            ChatInfo::Group { group_info } => (ChatType::Group, group_info.group_id),
            _ => return Err(DispatchError::UnsupportedChat),
        };
        self.send_text(chat_type, chat_id, text).await
    }
}

/// Sends the configured greeting to each newly connected contact
pub(crate) struct WelcomeHandler {
    pub template: String,
}

#[async_trait]
impl EventHandler for WelcomeHandler {
    async fn handle(&self, event: ChatResponse, bot: BotHandle) -> anyhow::Result<()> {
        let ChatResponse::ContactConnected { contact } = event else {
            return Ok(());
        };
        let name = &contact.profile.display_name;
        info!(contact = %name, contact_id = contact.contact_id, "Contact connected");

        let message = self.template.replace("{name}", name);
        bot.send_text(ChatType::Direct, contact.contact_id, message)
            .await?;
        Ok(())
    }
}
