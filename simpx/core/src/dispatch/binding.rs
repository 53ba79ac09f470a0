//! Parameter binding
//!
//! Command handlers declare the inputs they want from a fixed vocabulary
//! when they are registered. At dispatch time only those inputs are
//! assembled into [`BoundArgs`].

use std::collections::BTreeMap;

use crate::client::ChatClient;
use crate::protocol::{ChatInfo, ChatItem};

use super::handler::BotHandle;
use super::DispatchError;

/// An input a command handler can ask for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    /// The chat the command came from
    ChatInfo,
    /// The message carrying the command
    ChatItem,
    /// Handle to the running bot
    Bot,
    /// The chat client
    Client,
    /// A named value: `args` for exact commands, a capture group name for
    /// pattern commands
    Named {
        /// Value name
        name: String,
        /// Used when the value is absent; required when `None`
        default: Option<String>,
    },
    /// Every named value the handler did not declare individually
    Rest,
}

impl Param {
    /// Required named value
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            default: None,
        }
    }

    /// Named value with a fallback
    #[must_use]
    pub fn named_or(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

/// Everything available when a command fires
pub(crate) struct HandlerContext<'a> {
    pub chat_info: &'a ChatInfo,
    pub chat_item: &'a ChatItem,
    pub bot: &'a BotHandle,
    /// `args` or the pattern's named captures
    pub values: BTreeMap<String, String>,
}

/// The inputs a handler declared, filled in for one invocation
#[derive(Clone, Debug, Default)]
pub struct BoundArgs {
    chat_info: Option<ChatInfo>,
    chat_item: Option<ChatItem>,
    bot: Option<BotHandle>,
    client: Option<ChatClient>,
    values: BTreeMap<String, String>,
    rest: BTreeMap<String, String>,
}

impl BoundArgs {
    /// The originating chat, if declared
    #[must_use]
    pub fn chat_info(&self) -> Option<&ChatInfo> {
        self.chat_info.as_ref()
    }

    /// The originating message, if declared
    #[must_use]
    pub fn chat_item(&self) -> Option<&ChatItem> {
        self.chat_item.as_ref()
    }

    /// The bot handle, if declared
    #[must_use]
    pub fn bot(&self) -> Option<&BotHandle> {
        self.bot.as_ref()
    }

    /// The client, if declared
    #[must_use]
    pub fn client(&self) -> Option<&ChatClient> {
        self.client.as_ref()
    }

    /// A declared named value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Undeclared named values, present only when [`Param::Rest`] was declared
    #[must_use]
    pub fn rest(&self) -> &BTreeMap<String, String> {
        &self.rest
    }
}

/// Assemble the declared inputs
///
/// A required named value that is absent, or a client when none is
/// attached, fails the binding.
pub(crate) fn bind(params: &[Param], mut ctx: HandlerContext<'_>) -> Result<BoundArgs, DispatchError> {
    let mut args = BoundArgs::default();
    let mut wants_rest = false;

    for param in params {
        match param {
            Param::ChatInfo => args.chat_info = Some(ctx.chat_info.clone()),
            Param::ChatItem => args.chat_item = Some(ctx.chat_item.clone()),
            Param::Bot => args.bot = Some(ctx.bot.clone()),
            Param::Client => {
                let client = ctx.bot.client().ok_or(DispatchError::NoClient)?;
                args.client = Some(client.clone());
            }
            Param::Named { name, default } => {
                let value = match ctx.values.remove(name) {
                    Some(value) => value,
                    None => default
                        .clone()
                        .ok_or_else(|| DispatchError::MissingParam(name.clone()))?,
                };
                args.values.insert(name.clone(), value);
            }
            Param::Rest => wants_rest = true,
        }
    }

    if wants_rest {
        args.rest = ctx.values;
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CIContent;
    use serde_json::Value;

    fn item() -> ChatItem {
        ChatItem {
            chat_dir: Value::Null,
            meta: Value::Null,
            content: CIContent::Other,
        }
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_binds_only_declared() {
        let bot = BotHandle::detached("!");
        let chat_item = item();
        let ctx = HandlerContext {
            chat_info: &ChatInfo::Unsupported,
            chat_item: &chat_item,
            bot: &bot,
            values: values(&[("a", "2"), ("b", "3")]),
        };
        let args = bind(&[Param::named("a"), Param::ChatInfo], ctx).unwrap();
        assert_eq!(args.get("a"), Some("2"));
        assert_eq!(args.get("b"), None);
        assert!(args.chat_info().is_some());
        assert!(args.chat_item().is_none());
        assert!(args.bot().is_none());
        assert!(args.rest().is_empty());
    }

    #[test]
    fn test_default_and_missing() {
        let bot = BotHandle::detached("!");
        let chat_item = item();
        let ctx = || HandlerContext {
            chat_info: &ChatInfo::Unsupported,
            chat_item: &chat_item,
            bot: &bot,
            values: BTreeMap::new(),
        };

        let args = bind(&[Param::named_or("args", "")], ctx()).unwrap();
        assert_eq!(args.get("args"), Some(""));

        let err = bind(&[Param::named("args")], ctx()).unwrap_err();
        assert!(matches!(err, DispatchError::MissingParam(ref n) if n == "args"));

        let err = bind(&[Param::Client], ctx()).unwrap_err();
        assert!(matches!(err, DispatchError::NoClient));
    }

    #[test]
    fn test_rest_collects_undeclared() {
        let bot = BotHandle::detached("!");
        let chat_item = item();
        let ctx = HandlerContext {
            chat_info: &ChatInfo::Unsupported,
            chat_item: &chat_item,
            bot: &bot,
            values: values(&[("a", "1"), ("b", "2"), ("c", "3")]),
        };
        let args = bind(&[Param::named("a"), Param::Rest], ctx).unwrap();
        assert_eq!(args.get("a"), Some("1"));
        assert_eq!(args.rest(), &values(&[("b", "2"), ("c", "3")]));
    }
}
