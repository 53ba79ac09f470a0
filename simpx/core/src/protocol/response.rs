//! Daemon responses and events
//!
//! Every inbound payload is an object with a `type` discriminator. Tags that
//! the client API or the dispatcher inspect get a typed variant; everything
//! else decodes into [`ChatResponse::Other`] and keeps its raw JSON, so event
//! handlers can still be registered for it by tag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::envelope::FrameError;

// ============================================================================
// Profiles and participants
// ============================================================================

/// Public profile of a user or contact
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Name shown to other users
    pub display_name: String,
    /// Optional full name
    #[serde(default)]
    pub full_name: String,
    /// Base64 image data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Contact address advertised in the profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_link: Option<String>,
}

impl Profile {
    /// Profile with only a display name
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }
}

/// The local user the daemon is running as
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Daemon-side user id
    pub user_id: i64,
    /// Local display name
    pub local_display_name: String,
    /// User profile
    pub profile: Profile,
    /// Whether this is the active user
    #[serde(default)]
    pub active_user: bool,
}

/// A contact of the active user
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact id used in `@<id>` chat references
    pub contact_id: i64,
    /// Local display name
    pub local_display_name: String,
    /// Contact's profile
    pub profile: Profile,
}

/// Group profile, sent when creating or updating a group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProfile {
    /// Group name
    pub display_name: String,
    /// Full group name
    #[serde(default)]
    pub full_name: String,
    /// Base64 image data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Group as seen by the local user
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Group id used in `#<id>` chat references
    pub group_id: i64,
    /// Local display name
    pub local_display_name: String,
    /// Group profile
    pub group_profile: GroupProfile,
}

/// Member of a group
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// Member id within the group
    pub group_member_id: i64,
    /// Role name (`member`, `admin`, `owner`, ...)
    #[serde(default)]
    pub member_role: String,
    /// Local display name
    pub local_display_name: String,
}

/// Group with its member list, as returned by `/_members`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group info
    pub group_info: GroupInfo,
    /// Members other than the local user
    pub members: Vec<GroupMember>,
}

/// The user's long-term contact address
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContactLink {
    /// Address URI
    pub conn_req_contact: String,
    /// Auto-accept settings, if enabled
    #[serde(default)]
    pub auto_accept: Option<Value>,
}

// ============================================================================
// Chats and chat items
// ============================================================================

/// Which conversation a chat item belongs to
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChatInfo {
    /// Direct chat with a contact
    Direct {
        /// The contact
        contact: Contact,
    },
    /// Group chat
    Group {
        /// The group
        group_info: GroupInfo,
    },
    /// Pending contact request
    ContactRequest {
        /// Raw request payload
        contact_request: Value,
    },
    /// Chat kinds this client does not model
    #[serde(other)]
    Unsupported,
}

impl ChatInfo {
    /// The contact, for direct chats
    #[must_use]
    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Self::Direct { contact } => Some(contact),
            _ => None,
        }
    }
}

/// Message payload, treated as an opaque tagged object
///
/// Only `type` and `text` are interpreted; all other fields pass through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgContent {
    /// Content kind (`text`, `link`, `image`, `file`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Text part, empty for content without text
    #[serde(default)]
    pub text: String,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MsgContent {
    /// Plain text message
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: text.into(),
            extra: Map::new(),
        }
    }

    /// Start of a live (incrementally edited) text message
    #[must_use]
    pub fn live_text(text: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("liveType".into(), Value::String("start".into()));
        Self {
            kind: "liveText".into(),
            text: text.into(),
            extra,
        }
    }
}

/// Content of a chat item
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CIContent {
    /// Message sent by the local user
    SndMsgContent {
        /// Message payload
        msg_content: MsgContent,
    },
    /// Message received from a contact or member
    RcvMsgContent {
        /// Message payload
        msg_content: MsgContent,
    },
    /// Calls, group events, deletions and other non-message items
    #[serde(other)]
    Other,
}

/// A single chat item
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItem {
    /// Direction (sent/received, and by whom)
    #[serde(default)]
    pub chat_dir: Value,
    /// Item metadata (ids, timestamps, status)
    #[serde(default)]
    pub meta: Value,
    /// Item content
    pub content: CIContent,
}

/// Text of a chat item, if it is a sent or received message
#[must_use]
pub fn ci_content_text(item: &ChatItem) -> Option<&str> {
    match &item.content {
        CIContent::SndMsgContent { msg_content } | CIContent::RcvMsgContent { msg_content } => {
            Some(msg_content.text.as_str())
        }
        CIContent::Other => None,
    }
}

/// Chat item together with the chat it belongs to
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AChatItem {
    /// The conversation
    pub chat_info: ChatInfo,
    /// The item
    pub chat_item: ChatItem,
}

// ============================================================================
// Responses
// ============================================================================

/// Response or event from the daemon, discriminated by its `type` tag
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChatResponse {
    /// Currently active user
    ActiveUser {
        /// The user
        user: User,
    },
    /// All users on the daemon
    UsersList {
        /// User entries, raw
        users: Vec<Value>,
    },
    /// Chat subsystem started
    ChatStarted {},
    /// Chat subsystem was already running
    ChatRunning {},
    /// Chat subsystem stopped
    ChatStopped {},
    /// Generic success
    CmdOk {},
    /// A command failed
    ChatCmdError {
        /// Error detail, raw
        chat_error: Value,
    },
    /// Asynchronous error not tied to a command
    ChatError {
        /// Error detail, raw
        chat_error: Value,
    },
    /// Chat previews
    ApiChats {
        /// Chats, raw
        chats: Vec<Value>,
    },
    /// One chat with items
    ApiChat {
        /// Chat, raw
        chat: Value,
    },
    /// New chat items, sent or received
    NewChatItems {
        /// The items
        chat_items: Vec<AChatItem>,
    },
    /// A chat item was edited
    ChatItemUpdated {
        /// The edited item
        chat_item: AChatItem,
    },
    /// A chat item was deleted
    ChatItemDeleted {
        /// Item as it was before deletion, raw
        deleted_chat_item: Value,
        /// Replacement item, raw
        #[serde(default)]
        to_chat_item: Option<Value>,
        /// Whether the local user deleted it
        #[serde(default)]
        by_user: bool,
    },
    /// One-time invitation link created
    Invitation {
        /// Invitation URI
        conn_req_invitation: String,
    },
    /// Joined via a one-time invitation
    SentConfirmation {},
    /// Joined via a contact address
    SentInvitation {},
    /// Direct chat deleted
    ContactDeleted {
        /// The deleted contact
        contact: Contact,
    },
    /// Group chat deleted
    GroupDeletedUser {
        /// The deleted group
        group_info: GroupInfo,
    },
    /// Pending connection deleted
    ContactConnectionDeleted {
        /// Connection, raw
        connection: Value,
    },
    /// Chat history cleared
    ChatCleared {
        /// The chat
        chat_info: ChatInfo,
    },
    /// Profile update was a no-op
    UserProfileNoChange {},
    /// Profile updated
    UserProfileUpdated {
        /// Previous profile
        from_profile: Profile,
        /// New profile
        to_profile: Profile,
    },
    /// Contact alias changed
    ContactAliasUpdated {
        /// Updated contact
        to_contact: Contact,
    },
    /// Contact address created
    UserContactLinkCreated {
        /// Address URI
        conn_req_contact: String,
    },
    /// Contact address deleted
    UserContactLinkDeleted {},
    /// Contact address
    UserContactLink {
        /// The address
        contact_link: UserContactLink,
    },
    /// Address auto-accept settings changed
    UserContactLinkUpdated {},
    /// Contact request accepted
    AcceptingContactRequest {
        /// New contact
        contact: Contact,
    },
    /// Contact request rejected
    ContactRequestRejected {},
    /// Contact connection details
    ContactInfo {
        /// The contact
        contact: Contact,
        /// Connection statistics, raw
        connection_stats: Value,
        /// Incognito profile used with this contact
        #[serde(default)]
        custom_user_profile: Option<Profile>,
    },
    /// Group member connection details
    GroupMemberInfo {
        /// The group
        group_info: GroupInfo,
        /// The member
        member: GroupMember,
        /// Connection statistics, raw
        #[serde(default, rename = "connectionStats_")]
        connection_stats: Option<Value>,
    },
    /// File transfer accepted
    RcvFileAccepted {
        /// Item carrying the file
        chat_item: AChatItem,
    },
    /// Group created
    GroupCreated {
        /// The group
        group_info: GroupInfo,
    },
    /// Contact invited to a group
    SentGroupInvitation {
        /// The group
        group_info: GroupInfo,
        /// Invited contact
        contact: Contact,
        /// New member record
        member: GroupMember,
    },
    /// Group invitation accepted
    UserAcceptedGroupSent {
        /// The group
        group_info: GroupInfo,
    },
    /// Member removed by the local user
    UserDeletedMember {
        /// The group
        group_info: GroupInfo,
        /// Removed member
        member: GroupMember,
    },
    /// Local user left a group
    LeftMemberUser {
        /// The group
        group_info: GroupInfo,
    },
    /// Group member list
    GroupMembers {
        /// Group with members
        group: Group,
    },
    /// Group profile updated
    GroupUpdated {
        /// Previous group info
        from_group: GroupInfo,
        /// Updated group info
        to_group: GroupInfo,
    },
    /// A contact finished connecting
    ContactConnected {
        /// The contact
        contact: Contact,
    },
    /// Any tag without a typed variant, kept as raw JSON
    #[serde(untagged)]
    Other(Value),
}

impl ChatResponse {
    /// Decode a response object
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MissingTag`] when `type` is absent or not a
    /// string. A known tag whose fields have the wrong shape is not an
    /// error: it decodes as [`ChatResponse::Other`].
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        match value.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(FrameError::MissingTag("`type` is not a string".into())),
            None => return Err(FrameError::MissingTag("no `type` field".into())),
        }
        // `Other` accepts any object, so this does not fail in practice
        serde_json::from_value(value).map_err(|e| FrameError::InvalidJson(e.to_string()))
    }

    /// The wire tag of this response
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::ActiveUser { .. } => "activeUser",
            Self::UsersList { .. } => "usersList",
            Self::ChatStarted {} => "chatStarted",
            Self::ChatRunning {} => "chatRunning",
            Self::ChatStopped {} => "chatStopped",
            Self::CmdOk {} => "cmdOk",
            Self::ChatCmdError { .. } => "chatCmdError",
            Self::ChatError { .. } => "chatError",
            Self::ApiChats { .. } => "apiChats",
            Self::ApiChat { .. } => "apiChat",
            Self::NewChatItems { .. } => "newChatItems",
            Self::ChatItemUpdated { .. } => "chatItemUpdated",
            Self::ChatItemDeleted { .. } => "chatItemDeleted",
            Self::Invitation { .. } => "invitation",
            Self::SentConfirmation {} => "sentConfirmation",
            Self::SentInvitation {} => "sentInvitation",
            Self::ContactDeleted { .. } => "contactDeleted",
            Self::GroupDeletedUser { .. } => "groupDeletedUser",
            Self::ContactConnectionDeleted { .. } => "contactConnectionDeleted",
            Self::ChatCleared { .. } => "chatCleared",
            Self::UserProfileNoChange {} => "userProfileNoChange",
            Self::UserProfileUpdated { .. } => "userProfileUpdated",
            Self::ContactAliasUpdated { .. } => "contactAliasUpdated",
            Self::UserContactLinkCreated { .. } => "userContactLinkCreated",
            Self::UserContactLinkDeleted {} => "userContactLinkDeleted",
            Self::UserContactLink { .. } => "userContactLink",
            Self::UserContactLinkUpdated {} => "userContactLinkUpdated",
            Self::AcceptingContactRequest { .. } => "acceptingContactRequest",
            Self::ContactRequestRejected {} => "contactRequestRejected",
            Self::ContactInfo { .. } => "contactInfo",
            Self::GroupMemberInfo { .. } => "groupMemberInfo",
            Self::RcvFileAccepted { .. } => "rcvFileAccepted",
            Self::GroupCreated { .. } => "groupCreated",
            Self::SentGroupInvitation { .. } => "sentGroupInvitation",
            Self::UserAcceptedGroupSent { .. } => "userAcceptedGroupSent",
            Self::UserDeletedMember { .. } => "userDeletedMember",
            Self::LeftMemberUser { .. } => "leftMemberUser",
            Self::GroupMembers { .. } => "groupMembers",
            Self::GroupUpdated { .. } => "groupUpdated",
            Self::ContactConnected { .. } => "contactConnected",
            Self::Other(raw) => raw.get("type").and_then(Value::as_str).unwrap_or_default(),
        }
    }

    /// Whether this is a `chatCmdError` whose error has the given kind
    ///
    /// `kind` is the outer error `type`, `detail_field` names the nested
    /// object whose `type` must equal `detail`, e.g.
    /// `("error", "errorType", "noActiveUser")`.
    #[must_use]
    pub fn is_cmd_error(&self, kind: &str, detail_field: &str, detail: &str) -> bool {
        let Self::ChatCmdError { chat_error } = self else {
            return false;
        };
        chat_error.get("type").and_then(Value::as_str) == Some(kind)
            && chat_error
                .get(detail_field)
                .and_then(|d| d.get("type"))
                .and_then(Value::as_str)
                == Some(detail)
    }
}
