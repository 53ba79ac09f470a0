//! Command Language
//!
//! The `cmd` field of an outbound frame is not JSON but the daemon's
//! line-oriented command language, e.g. `/_send @12 json [...]`. Structured
//! arguments are embedded as JSON after a `json` keyword or inline.
//!
//! [`ChatCommand`] renders to that text through its `Display` impl.

use std::fmt;

use serde::Serialize;

use super::response::{GroupProfile, MsgContent, Profile};

/// Kind of conversation, rendered as its reference prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatType {
    /// `@<contactId>`
    Direct,
    /// `#<groupId>`
    Group,
    /// `<@<contactRequestId>`
    ContactRequest,
}

impl ChatType {
    /// Reference prefix used in commands
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Direct => "@",
            Self::Group => "#",
            Self::ContactRequest => "<@",
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Role of a group member
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupMemberRole {
    /// Regular member
    Member,
    /// Administrator
    Admin,
    /// Owner
    Owner,
}

impl fmt::Display for GroupMemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        })
    }
}

/// How a chat item is deleted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// Delete for everyone
    Broadcast,
    /// Delete locally only
    Internal,
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Broadcast => "broadcast",
            Self::Internal => "internal",
        })
    }
}

/// Window of chat items to load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatPagination {
    /// The most recent `count` items
    Last {
        /// Number of items
        count: u32,
    },
    /// `count` items after an item id
    After {
        /// Anchor item id
        item_id: i64,
        /// Number of items
        count: u32,
    },
    /// `count` items before an item id
    Before {
        /// Anchor item id
        item_id: i64,
        /// Number of items
        count: u32,
    },
}

impl Default for ChatPagination {
    fn default() -> Self {
        Self::Last { count: 100 }
    }
}

impl fmt::Display for ChatPagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last { count } => write!(f, " count={count}"),
            Self::After { item_id, count } => write!(f, " after={item_id} count={count}"),
            Self::Before { item_id, count } => write!(f, " before={item_id} count={count}"),
        }
    }
}

/// Settings for accepting contact requests to the user address
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutoAccept {
    /// Accept using a fresh incognito profile
    pub accept_incognito: bool,
    /// Message sent to every accepted contact
    pub auto_reply: Option<MsgContent>,
}

/// A message to send
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedMessage {
    /// Message payload
    pub msg_content: MsgContent,
    /// Local file to attach
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Item being replied to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_item_id: Option<i64>,
    /// Disappearing-message timer in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl ComposedMessage {
    /// Message with content only
    #[must_use]
    pub fn new(msg_content: MsgContent) -> Self {
        Self {
            msg_content,
            file_path: None,
            quoted_item_id: None,
            ttl: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserArgs<'a> {
    profile: Option<&'a Profile>,
    same_servers: bool,
    past_timestamp: bool,
}

/// A command for the chat daemon
#[derive(Clone, Debug, PartialEq)]
pub enum ChatCommand {
    /// `/u`
    ShowActiveUser,
    /// `/_create user <json>`
    CreateActiveUser {
        /// Profile for the new user, daemon prompts when absent
        profile: Option<Profile>,
        /// Reuse the current user's servers
        same_servers: bool,
        /// Backdate the user creation
        past_timestamp: bool,
    },
    /// `/users`
    ListUsers,
    /// `/_start subscribe=.. expire=..`
    StartChat {
        /// Subscribe to existing connections
        subscribe_connections: bool,
        /// Run disappearing-item expiry
        enable_expire_chat_items: bool,
    },
    /// `/_stop`
    StopChat,
    /// `/incognito on|off`
    SetIncognito(bool),
    /// `/_get chats pcc=..`
    GetChats {
        /// Include pending connections
        pending_connections: bool,
    },
    /// `/_get chat <ref> <pagination> [search]`
    GetChat {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Item window
        pagination: ChatPagination,
        /// Optional text filter
        search: Option<String>,
    },
    /// `/_send <ref> json <messages>`
    SendMessages {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Messages to send
        messages: Vec<ComposedMessage>,
    },
    /// `/_update item <ref> <itemId> json <content>`
    UpdateChatItem {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Item to edit
        chat_item_id: i64,
        /// New content
        msg_content: MsgContent,
    },
    /// `/_delete item <ref> <itemId> <mode>`
    DeleteChatItem {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Item to delete
        chat_item_id: i64,
        /// Deletion mode
        delete_mode: DeleteMode,
    },
    /// `/_read chat <ref> [from=.. to=..]`
    ChatRead {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Inclusive item id range, whole chat when absent
        item_range: Option<(i64, i64)>,
    },
    /// `/_read chat items <ref> <ids>`
    ChatItemsRead {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
        /// Items to mark read
        item_ids: Vec<i64>,
    },
    /// `/_delete <ref>`
    DeleteChat {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
    },
    /// `/_clear chat <ref>`
    ClearChat {
        /// Chat kind
        chat_type: ChatType,
        /// Chat id
        chat_id: i64,
    },
    /// `/_accept <id>`
    AcceptContact(i64),
    /// `/_reject <id>`
    RejectContact(i64),
    /// `/_profile <userId> <json>`
    UpdateProfile {
        /// User whose profile changes
        user_id: i64,
        /// New profile
        profile: Profile,
    },
    /// `/_set alias @<id> <alias>`
    SetContactAlias {
        /// Contact id
        contact_id: i64,
        /// New alias, trimmed when rendered
        local_alias: String,
    },
    /// `/_group <json>`
    NewGroup(GroupProfile),
    /// `/_add #<groupId> <contactId> <role>`
    AddMember {
        /// Group id
        group_id: i64,
        /// Contact to invite
        contact_id: i64,
        /// Role to grant
        member_role: GroupMemberRole,
    },
    /// `/_join #<groupId>`
    JoinGroup(i64),
    /// `/_remove #<groupId> <memberId>`
    RemoveMember {
        /// Group id
        group_id: i64,
        /// Member to remove
        member_id: i64,
    },
    /// `/_leave #<groupId>`
    LeaveGroup(i64),
    /// `/_members #<groupId>`
    ListMembers(i64),
    /// `/_group_profile #<groupId> <json>`
    UpdateGroupProfile {
        /// Group id
        group_id: i64,
        /// New group profile
        group_profile: GroupProfile,
    },
    /// `/_info @<contactId>`
    ContactInfo(i64),
    /// `/_info #<groupId> <memberId>`
    GroupMemberInfo {
        /// Group id
        group_id: i64,
        /// Member id
        member_id: i64,
    },
    /// `/connect`: create a one-time invitation
    AddContact,
    /// `/connect <link>`: join via invitation or address
    Connect(String),
    /// `/address`
    CreateMyAddress,
    /// `/delete_address`
    DeleteMyAddress,
    /// `/show_address`
    ShowMyAddress,
    /// `/auto_accept on|off ..`
    AddressAutoAccept(Option<AutoAccept>),
    /// `/freceive <fileId> [path]`
    ReceiveFile {
        /// File id
        file_id: i64,
        /// Where to save the file
        file_path: Option<String>,
    },
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn write_json<T: Serialize + ?Sized>(f: &mut fmt::Formatter<'_>, value: &T) -> fmt::Result {
    let json = serde_json::to_string(value).map_err(|_| fmt::Error)?;
    f.write_str(&json)
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShowActiveUser => f.write_str("/u"),
            Self::CreateActiveUser {
                profile,
                same_servers,
                past_timestamp,
            } => {
                f.write_str("/_create user ")?;
                write_json(
                    f,
                    &CreateUserArgs {
                        profile: profile.as_ref(),
                        same_servers: *same_servers,
                        past_timestamp: *past_timestamp,
                    },
                )
            }
            Self::ListUsers => f.write_str("/users"),
            Self::StartChat {
                subscribe_connections,
                enable_expire_chat_items,
            } => write!(
                f,
                "/_start subscribe={} expire={}",
                on_off(*subscribe_connections),
                on_off(*enable_expire_chat_items)
            ),
            Self::StopChat => f.write_str("/_stop"),
            Self::SetIncognito(on) => write!(f, "/incognito {}", on_off(*on)),
            Self::GetChats {
                pending_connections,
            } => write!(f, "/_get chats pcc={}", on_off(*pending_connections)),
            Self::GetChat {
                chat_type,
                chat_id,
                pagination,
                search,
            } => {
                write!(f, "/_get chat {chat_type}{chat_id}{pagination}")?;
                match search.as_deref() {
                    Some(search) if !search.is_empty() => write!(f, " {search}"),
                    _ => Ok(()),
                }
            }
            Self::SendMessages {
                chat_type,
                chat_id,
                messages,
            } => {
                write!(f, "/_send {chat_type}{chat_id} json ")?;
                write_json(f, messages)
            }
            Self::UpdateChatItem {
                chat_type,
                chat_id,
                chat_item_id,
                msg_content,
            } => {
                write!(f, "/_update item {chat_type}{chat_id} {chat_item_id} json ")?;
                write_json(f, msg_content)
            }
            Self::DeleteChatItem {
                chat_type,
                chat_id,
                chat_item_id,
                delete_mode,
            } => write!(
                f,
                "/_delete item {chat_type}{chat_id} {chat_item_id} {delete_mode}"
            ),
            Self::ChatRead {
                chat_type,
                chat_id,
                item_range,
            } => {
                write!(f, "/_read chat {chat_type}{chat_id}")?;
                match item_range {
                    Some((from, to)) => write!(f, " from={from} to={to}"),
                    None => Ok(()),
                }
            }
            Self::ChatItemsRead {
                chat_type,
                chat_id,
                item_ids,
            } => {
                write!(f, "/_read chat items {chat_type}{chat_id} ")?;
                let ids: Vec<String> = item_ids.iter().map(ToString::to_string).collect();
                f.write_str(&ids.join(" "))
            }
            Self::DeleteChat { chat_type, chat_id } => write!(f, "/_delete {chat_type}{chat_id}"),
            Self::ClearChat { chat_type, chat_id } => {
                write!(f, "/_clear chat {chat_type}{chat_id}")
            }
            Self::AcceptContact(id) => write!(f, "/_accept {id}"),
            Self::RejectContact(id) => write!(f, "/_reject {id}"),
            Self::UpdateProfile { user_id, profile } => {
                write!(f, "/_profile {user_id} ")?;
                write_json(f, profile)
            }
            Self::SetContactAlias {
                contact_id,
                local_alias,
            } => write!(f, "/_set alias @{contact_id} {}", local_alias.trim()),
            Self::NewGroup(profile) => {
                f.write_str("/_group ")?;
                write_json(f, profile)
            }
            Self::AddMember {
                group_id,
                contact_id,
                member_role,
            } => write!(f, "/_add #{group_id} {contact_id} {member_role}"),
            Self::JoinGroup(group_id) => write!(f, "/_join #{group_id}"),
            Self::RemoveMember {
                group_id,
                member_id,
            } => write!(f, "/_remove #{group_id} {member_id}"),
            Self::LeaveGroup(group_id) => write!(f, "/_leave #{group_id}"),
            Self::ListMembers(group_id) => write!(f, "/_members #{group_id}"),
            Self::UpdateGroupProfile {
                group_id,
                group_profile,
            } => {
                write!(f, "/_group_profile #{group_id} ")?;
                write_json(f, group_profile)
            }
            Self::ContactInfo(contact_id) => write!(f, "/_info @{contact_id}"),
            Self::GroupMemberInfo {
                group_id,
                member_id,
            } => write!(f, "/_info #{group_id} {member_id}"),
            Self::AddContact => f.write_str("/connect"),
            Self::Connect(conn_req) => write!(f, "/connect {conn_req}"),
            Self::CreateMyAddress => f.write_str("/address"),
            Self::DeleteMyAddress => f.write_str("/delete_address"),
            Self::ShowMyAddress => f.write_str("/show_address"),
            Self::AddressAutoAccept(None) => f.write_str("/auto_accept off"),
            Self::AddressAutoAccept(Some(settings)) => {
                f.write_str("/auto_accept on")?;
                if settings.accept_incognito {
                    f.write_str(" incognito=on")?;
                }
                if let Some(reply) = &settings.auto_reply {
                    f.write_str(" json ")?;
                    write_json(f, reply)?;
                }
                Ok(())
            }
            Self::ReceiveFile { file_id, file_path } => {
                write!(f, "/freceive {file_id}")?;
                match file_path.as_deref() {
                    Some(path) if !path.is_empty() => write!(f, " {path}"),
                    _ => Ok(()),
                }
            }
        }
    }
}
