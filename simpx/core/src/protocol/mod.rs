//! Wire Protocol
//!
//! Types exchanged with the chat daemon:
//!
//! - [`envelope`]: the JSON frames carrying correlation ids
//! - [`response`]: tagged responses and events decoded from those frames
//! - [`command`]: the text command language placed in outbound frames

pub mod command;
pub mod envelope;
pub mod response;

pub use command::{
    AutoAccept, ChatCommand, ChatPagination, ChatType, ComposedMessage, DeleteMode,
    GroupMemberRole,
};
pub use envelope::{ChatSrvRequest, CorrId, FrameError, InboundFrame};
pub use response::{
    ci_content_text, AChatItem, CIContent, ChatInfo, ChatItem, ChatResponse, Contact, Group,
    GroupInfo, GroupMember, GroupProfile, MsgContent, Profile, User, UserContactLink,
};
