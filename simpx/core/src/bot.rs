//! Bot runner
//!
//! Ties a [`ChatClient`] to a [`Dispatcher`]: checks that the daemon has an
//! active user, makes sure the user has an address that accepts contacts
//! automatically, then dispatches events until the connection closes.

use thiserror::Error;
use tracing::info;

use crate::client::{ChatClient, ClientError};
use crate::dispatch::{DispatchError, Dispatcher, DispatcherBuilder};
use crate::protocol::User;

/// Errors starting or running a bot
#[derive(Debug, Error)]
pub enum BotError {
    /// The daemon has no user profile to run as
    #[error("no active user profile; create one with the chat terminal client first")]
    NoActiveUser,

    /// A daemon request failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The dispatcher could not be built
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A bot ready to dispatch events
#[derive(Debug)]
pub struct Bot {
    client: ChatClient,
    dispatcher: Dispatcher,
    user: User,
    address: String,
}

impl Bot {
    /// Connect, set up and run until the connection closes
    ///
    /// # Errors
    ///
    /// See [`Bot::connect`].
    #[cfg(feature = "websocket")]
    pub async fn start(
        config: &crate::transport::TransportConfig,
        dispatcher: DispatcherBuilder,
    ) -> Result<(), BotError> {
        Self::connect(config, dispatcher).await?.run().await;
        Ok(())
    }

    /// Set up on an already connected client and run until it closes
    ///
    /// # Errors
    ///
    /// See [`Bot::new`].
    pub async fn run_with_client(
        client: ChatClient,
        dispatcher: DispatcherBuilder,
    ) -> Result<(), BotError> {
        Self::new(client, dispatcher).await?.run().await;
        Ok(())
    }

    /// Connect over WebSocket and set up
    ///
    /// # Errors
    ///
    /// Returns `BotError::Client` if the connection fails, otherwise see
    /// [`Bot::new`].
    #[cfg(feature = "websocket")]
    pub async fn connect(
        config: &crate::transport::TransportConfig,
        dispatcher: DispatcherBuilder,
    ) -> Result<Self, BotError> {
        let client = ChatClient::connect(config).await?;
        Self::new(client, dispatcher).await
    }

    /// Prepare the daemon and build the dispatcher
    ///
    /// # Errors
    ///
    /// - `NoActiveUser` when the daemon has no user
    /// - `Client` when a setup request fails
    /// - `Dispatch` when a command pattern does not compile
    pub async fn new(client: ChatClient, dispatcher: DispatcherBuilder) -> Result<Self, BotError> {
        let user = client
            .api_get_active_user()
            .await?
            .ok_or(BotError::NoActiveUser)?;
        info!(
            display_name = %user.profile.display_name,
            full_name = %user.profile.full_name,
            "Bot profile"
        );

        let address = match client.api_get_user_address().await? {
            Some(address) => address,
            None => client.api_create_user_address().await?,
        };
        info!(address = %address, "Bot address");

        client.enable_address_auto_accept(false, None).await?;

        let dispatcher = dispatcher.client(client.clone()).build()?;
        Ok(Self {
            client,
            dispatcher,
            user,
            address,
        })
    }

    /// Dispatch events until the connection closes
    pub async fn run(&self) {
        let events = self.client.events();
        self.dispatcher.run(&events).await;
    }

    /// Disconnect from the daemon
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if closing the transport fails.
    pub async fn close(&self) -> Result<(), BotError> {
        self.client.disconnect().await?;
        Ok(())
    }

    /// The user the bot runs as
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The bot's contact address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The client
    #[must_use]
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// The dispatcher
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DaemonEndpoint, InProcessTransport, TransportConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn user() -> Value {
        json!({
            "userId": 1,
            "localDisplayName": "bot",
            "profile": {"displayName": "bot", "fullName": "Example Bot"},
            "activeUser": true
        })
    }

    /// Answer requests in order with `replies`, returning the commands seen
    fn script(mut daemon: DaemonEndpoint, replies: Vec<Value>) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let Some(request) = daemon.next_request().await else {
                    break;
                };
                seen.push(request.cmd.clone());
                daemon.respond(&request.corr_id, reply).await;
            }
            seen
        })
    }

    fn client() -> (ChatClient, DaemonEndpoint) {
        let (transport, daemon) = InProcessTransport::new_pair(&TransportConfig::default());
        (ChatClient::new(Arc::new(transport), 4), daemon)
    }

    #[tokio::test]
    async fn test_setup_creates_missing_address() {
        let (client, daemon) = client();
        let daemon = script(
            daemon,
            vec![
                json!({"type": "activeUser", "user": user()}),
                json!({
                    "type": "chatCmdError",
                    "chatError": {"type": "errorStore", "storeError": {"type": "userContactLinkNotFound"}}
                }),
                json!({"type": "userContactLinkCreated", "connReqContact": "simplex:/contact#abc"}),
                json!({"type": "userContactLinkUpdated"}),
            ],
        );

        let bot = Bot::new(client, Dispatcher::builder()).await.unwrap();
        assert_eq!(bot.user().profile.display_name, "bot");
        assert_eq!(bot.address(), "simplex:/contact#abc");

        let seen = daemon.await.unwrap();
        assert_eq!(seen, vec!["/u", "/show_address", "/address", "/auto_accept on"]);
    }

    #[tokio::test]
    async fn test_setup_requires_active_user() {
        let (client, daemon) = client();
        let _daemon = script(
            daemon,
            vec![json!({
                "type": "chatCmdError",
                "chatError": {"type": "error", "errorType": {"type": "noActiveUser"}}
            })],
        );
        let err = Bot::new(client, Dispatcher::builder()).await.unwrap_err();
        assert!(matches!(err, BotError::NoActiveUser));
    }

    #[tokio::test]
    async fn test_run_ends_when_connection_closes() {
        let (client, daemon) = client();
        let daemon = script(
            daemon,
            vec![
                json!({"type": "activeUser", "user": user()}),
                json!({"type": "userContactLink", "contactLink": {"connReqContact": "simplex:/contact#xyz"}}),
                json!({"type": "userContactLinkUpdated"}),
            ],
        );
        let bot = Bot::new(client, Dispatcher::builder()).await.unwrap();
        let seen = daemon.await.unwrap();
        assert_eq!(seen.len(), 3);

        bot.close().await.unwrap();
        bot.run().await;
        assert_eq!(
            bot.dispatcher().state(),
            crate::dispatch::DispatcherState::Closed
        );
    }
}
