//! Typed daemon API
//!
//! One method per command. Each checks that the daemon answered with the
//! response tag that command produces, and returns [`ChatCommandError`]
//! carrying the raw response otherwise.

use serde_json::Value;

use crate::protocol::{
    AChatItem, AutoAccept, ChatCommand, ChatInfo, ChatPagination, ChatResponse, ChatType,
    ComposedMessage, Contact, DeleteMode, GroupInfo, GroupMember, GroupMemberRole, GroupProfile,
    MsgContent, Profile, User,
};

use super::{ChatClient, ChatCommandError, ClientError};

/// What kind of link `api_connect` joined through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnReqType {
    /// One-time invitation
    Invitation,
    /// Long-term contact address
    Contact,
}

/// Connection details of a contact
#[derive(Clone, Debug, PartialEq)]
pub struct ContactConnectionInfo {
    /// Connection statistics, raw
    pub connection_stats: Value,
    /// Incognito profile used with this contact
    pub custom_user_profile: Option<Profile>,
}

fn unexpected<T>(message: &str, response: ChatResponse) -> Result<T, ClientError> {
    Err(ChatCommandError::new(message, response).into())
}

impl ChatClient {
    /// Send a command whose only success answer is `cmdOk`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` for any other answer.
    pub async fn ok_chat_command(&self, cmd: &ChatCommand) -> Result<(), ClientError> {
        match self.send_chat_cmd(cmd).await? {
            ChatResponse::CmdOk {} => Ok(()),
            r => unexpected(&format!("Command `{cmd}` failed"), r),
        }
    }

    /// The active user, `None` if the daemon has no user yet
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` for any other error.
    pub async fn api_get_active_user(&self) -> Result<Option<User>, ClientError> {
        match self.send_chat_cmd(&ChatCommand::ShowActiveUser).await? {
            ChatResponse::ActiveUser { user } => Ok(Some(user)),
            r if r.is_cmd_error("error", "errorType", "noActiveUser") => Ok(None),
            r => unexpected("Unexpected response", r),
        }
    }

    /// Create a user and make it active
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` if the daemon refuses.
    pub async fn api_create_active_user(
        &self,
        profile: Option<Profile>,
        same_servers: bool,
        past_timestamp: bool,
    ) -> Result<User, ClientError> {
        let cmd = ChatCommand::CreateActiveUser {
            profile,
            same_servers,
            past_timestamp,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ActiveUser { user } => Ok(user),
            r => unexpected("Unexpected response", r),
        }
    }

    /// All users on the daemon, raw
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_list_users(&self) -> Result<Vec<Value>, ClientError> {
        match self.send_chat_cmd(&ChatCommand::ListUsers).await? {
            ChatResponse::UsersList { users } => Ok(users),
            r => unexpected("Error listing users", r),
        }
    }

    /// Start the chat subsystem; succeeds if it is already running
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_start_chat(
        &self,
        subscribe_connections: bool,
        enable_expire_chat_items: bool,
    ) -> Result<(), ClientError> {
        let cmd = ChatCommand::StartChat {
            subscribe_connections,
            enable_expire_chat_items,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ChatStarted {} | ChatResponse::ChatRunning {} => Ok(()),
            r => unexpected("Error starting chat", r),
        }
    }

    /// Stop the chat subsystem
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_stop_chat(&self) -> Result<(), ClientError> {
        match self.send_chat_cmd(&ChatCommand::StopChat).await? {
            ChatResponse::ChatStopped {} => Ok(()),
            r => unexpected("Error stopping chat", r),
        }
    }

    /// Turn incognito mode on or off
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_set_incognito(&self, incognito: bool) -> Result<(), ClientError> {
        self.ok_chat_command(&ChatCommand::SetIncognito(incognito))
            .await
    }

    /// Accept contact requests to the user address automatically
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn enable_address_auto_accept(
        &self,
        accept_incognito: bool,
        auto_reply: Option<MsgContent>,
    ) -> Result<(), ClientError> {
        self.set_address_auto_accept(Some(AutoAccept {
            accept_incognito,
            auto_reply,
        }))
        .await
    }

    /// Stop accepting contact requests automatically
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn disable_address_auto_accept(&self) -> Result<(), ClientError> {
        self.set_address_auto_accept(None).await
    }

    async fn set_address_auto_accept(
        &self,
        settings: Option<AutoAccept>,
    ) -> Result<(), ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::AddressAutoAccept(settings))
            .await?
        {
            ChatResponse::UserContactLinkUpdated {} => Ok(()),
            r => unexpected("Error changing user contact address mode", r),
        }
    }

    /// Chat previews, raw
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_get_chats(&self, pending_connections: bool) -> Result<Vec<Value>, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::GetChats {
                pending_connections,
            })
            .await?
        {
            ChatResponse::ApiChats { chats } => Ok(chats),
            r => unexpected("Error loading chats", r),
        }
    }

    /// One chat with a window of its items, raw
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_get_chat(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        pagination: ChatPagination,
        search: Option<String>,
    ) -> Result<Value, ClientError> {
        let cmd = ChatCommand::GetChat {
            chat_type,
            chat_id,
            pagination,
            search,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ApiChat { chat } => Ok(chat),
            r => unexpected("Error loading chat", r),
        }
    }

    /// Send messages to a chat
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_send_messages(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        messages: Vec<ComposedMessage>,
    ) -> Result<Vec<AChatItem>, ClientError> {
        let cmd = ChatCommand::SendMessages {
            chat_type,
            chat_id,
            messages,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::NewChatItems { chat_items } => Ok(chat_items),
            r => unexpected("Unexpected response", r),
        }
    }

    /// Send a plain text message
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_send_text_message(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        text: impl Into<String>,
    ) -> Result<Vec<AChatItem>, ClientError> {
        let message = ComposedMessage::new(MsgContent::text(text));
        self.api_send_messages(chat_type, chat_id, vec![message])
            .await
    }

    /// Start a live text message, optionally disappearing after `ttl` seconds
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_send_live_text_message(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        text: impl Into<String>,
        ttl: Option<u64>,
    ) -> Result<Vec<AChatItem>, ClientError> {
        let message = ComposedMessage {
            ttl,
            ..ComposedMessage::new(MsgContent::live_text(text))
        };
        self.api_send_messages(chat_type, chat_id, vec![message])
            .await
    }

    /// Edit a chat item
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_update_chat_item(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        chat_item_id: i64,
        msg_content: MsgContent,
    ) -> Result<AChatItem, ClientError> {
        let cmd = ChatCommand::UpdateChatItem {
            chat_type,
            chat_id,
            chat_item_id,
            msg_content,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ChatItemUpdated { chat_item } => Ok(chat_item),
            r => unexpected("Error updating chat item", r),
        }
    }

    /// Delete a chat item, returning the replacement item if one was left
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_delete_chat_item(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        chat_item_id: i64,
        delete_mode: DeleteMode,
    ) -> Result<Option<Value>, ClientError> {
        let cmd = ChatCommand::DeleteChatItem {
            chat_type,
            chat_id,
            chat_item_id,
            delete_mode,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ChatItemDeleted { to_chat_item, .. } => Ok(to_chat_item),
            r => unexpected("Error deleting chat item", r),
        }
    }

    /// Create a one-time invitation link
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_create_link(&self) -> Result<String, ClientError> {
        match self.send_chat_cmd(&ChatCommand::AddContact).await? {
            ChatResponse::Invitation {
                conn_req_invitation,
            } => Ok(conn_req_invitation),
            r => unexpected("Error creating link", r),
        }
    }

    /// Connect via an invitation link or contact address
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_connect(&self, conn_req: impl Into<String>) -> Result<ConnReqType, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::Connect(conn_req.into()))
            .await?
        {
            ChatResponse::SentConfirmation {} => Ok(ConnReqType::Invitation),
            ChatResponse::SentInvitation {} => Ok(ConnReqType::Contact),
            r => unexpected("Connection error", r),
        }
    }

    /// Delete a chat
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` if the answer does not match the chat
    /// type.
    pub async fn api_delete_chat(&self, chat_type: ChatType, chat_id: i64) -> Result<(), ClientError> {
        let r = self
            .send_chat_cmd(&ChatCommand::DeleteChat { chat_type, chat_id })
            .await?;
        let deleted = matches!(
            (chat_type, &r),
            (ChatType::Direct, ChatResponse::ContactDeleted { .. })
                | (ChatType::Group, ChatResponse::GroupDeletedUser { .. })
                | (ChatType::ContactRequest, ChatResponse::ContactConnectionDeleted { .. })
        );
        if deleted {
            Ok(())
        } else {
            unexpected("Error deleting chat", r)
        }
    }

    /// Clear a chat's history
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_clear_chat(&self, chat_type: ChatType, chat_id: i64) -> Result<ChatInfo, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::ClearChat { chat_type, chat_id })
            .await?
        {
            ChatResponse::ChatCleared { chat_info } => Ok(chat_info),
            r => unexpected("Error clearing chat", r),
        }
    }

    /// Update the user's profile, `None` if nothing changed
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_update_profile(
        &self,
        user_id: i64,
        profile: Profile,
    ) -> Result<Option<Profile>, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::UpdateProfile { user_id, profile })
            .await?
        {
            ChatResponse::UserProfileNoChange {} => Ok(None),
            ChatResponse::UserProfileUpdated { to_profile, .. } => Ok(Some(to_profile)),
            r => unexpected("Error updating profile", r),
        }
    }

    /// Set a contact's local alias
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_set_contact_alias(
        &self,
        contact_id: i64,
        local_alias: impl Into<String>,
    ) -> Result<Contact, ClientError> {
        let cmd = ChatCommand::SetContactAlias {
            contact_id,
            local_alias: local_alias.into(),
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::ContactAliasUpdated { to_contact } => Ok(to_contact),
            r => unexpected("Error updating contact alias", r),
        }
    }

    /// Create the user's long-term address
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_create_user_address(&self) -> Result<String, ClientError> {
        match self.send_chat_cmd(&ChatCommand::CreateMyAddress).await? {
            ChatResponse::UserContactLinkCreated { conn_req_contact } => Ok(conn_req_contact),
            r => unexpected("Error creating user address", r),
        }
    }

    /// Delete the user's address
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_delete_user_address(&self) -> Result<(), ClientError> {
        match self.send_chat_cmd(&ChatCommand::DeleteMyAddress).await? {
            ChatResponse::UserContactLinkDeleted {} => Ok(()),
            r => unexpected("Error deleting user address", r),
        }
    }

    /// The user's address, `None` if none was created
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_get_user_address(&self) -> Result<Option<String>, ClientError> {
        match self.send_chat_cmd(&ChatCommand::ShowMyAddress).await? {
            ChatResponse::UserContactLink { contact_link } => Ok(Some(contact_link.conn_req_contact)),
            r if r.is_cmd_error("errorStore", "storeError", "userContactLinkNotFound") => Ok(None),
            r => unexpected("Error loading user address", r),
        }
    }

    /// Accept a contact request
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_accept_contact_request(&self, contact_req_id: i64) -> Result<Contact, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::AcceptContact(contact_req_id))
            .await?
        {
            ChatResponse::AcceptingContactRequest { contact } => Ok(contact),
            r => unexpected("Error accepting contact request", r),
        }
    }

    /// Reject a contact request
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_reject_contact_request(&self, contact_req_id: i64) -> Result<(), ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::RejectContact(contact_req_id))
            .await?
        {
            ChatResponse::ContactRequestRejected {} => Ok(()),
            r => unexpected("Error rejecting contact request", r),
        }
    }

    /// Mark a chat, or a range of its items, as read
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_chat_read(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        item_range: Option<(i64, i64)>,
    ) -> Result<(), ClientError> {
        self.ok_chat_command(&ChatCommand::ChatRead {
            chat_type,
            chat_id,
            item_range,
        })
        .await
    }

    /// Mark specific items as read
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_chat_items_read(
        &self,
        chat_type: ChatType,
        chat_id: i64,
        item_ids: Vec<i64>,
    ) -> Result<(), ClientError> {
        self.ok_chat_command(&ChatCommand::ChatItemsRead {
            chat_type,
            chat_id,
            item_ids,
        })
        .await
    }

    /// Connection details of a contact
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_contact_info(&self, contact_id: i64) -> Result<ContactConnectionInfo, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::ContactInfo(contact_id))
            .await?
        {
            ChatResponse::ContactInfo {
                connection_stats,
                custom_user_profile,
                ..
            } => Ok(ContactConnectionInfo {
                connection_stats,
                custom_user_profile,
            }),
            r => unexpected("Error loading contact info", r),
        }
    }

    /// Connection statistics of a group member, raw
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_group_member_info(
        &self,
        group_id: i64,
        member_id: i64,
    ) -> Result<Option<Value>, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::GroupMemberInfo {
                group_id,
                member_id,
            })
            .await?
        {
            ChatResponse::GroupMemberInfo {
                connection_stats, ..
            } => Ok(connection_stats),
            r => unexpected("Error loading group member info", r),
        }
    }

    /// Accept an incoming file
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_receive_file(
        &self,
        file_id: i64,
        file_path: Option<String>,
    ) -> Result<AChatItem, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::ReceiveFile { file_id, file_path })
            .await?
        {
            ChatResponse::RcvFileAccepted { chat_item } => Ok(chat_item),
            r => unexpected("Error receiving file", r),
        }
    }

    /// Create a group
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_new_group(&self, group_profile: GroupProfile) -> Result<GroupInfo, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::NewGroup(group_profile))
            .await?
        {
            ChatResponse::GroupCreated { group_info } => Ok(group_info),
            r => unexpected("Error creating group", r),
        }
    }

    /// Invite a contact to a group
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_add_member(
        &self,
        group_id: i64,
        contact_id: i64,
        member_role: GroupMemberRole,
    ) -> Result<GroupMember, ClientError> {
        let cmd = ChatCommand::AddMember {
            group_id,
            contact_id,
            member_role,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::SentGroupInvitation { member, .. } => Ok(member),
            r => unexpected("Error adding member", r),
        }
    }

    /// Accept a group invitation
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_join_group(&self, group_id: i64) -> Result<GroupInfo, ClientError> {
        match self.send_chat_cmd(&ChatCommand::JoinGroup(group_id)).await? {
            ChatResponse::UserAcceptedGroupSent { group_info } => Ok(group_info),
            r => unexpected("Error joining group", r),
        }
    }

    /// Remove a member from a group
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_remove_member(&self, group_id: i64, member_id: i64) -> Result<GroupMember, ClientError> {
        match self
            .send_chat_cmd(&ChatCommand::RemoveMember {
                group_id,
                member_id,
            })
            .await?
        {
            ChatResponse::UserDeletedMember { member, .. } => Ok(member),
            r => unexpected("Error removing member", r),
        }
    }

    /// Leave a group
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_leave_group(&self, group_id: i64) -> Result<GroupInfo, ClientError> {
        match self.send_chat_cmd(&ChatCommand::LeaveGroup(group_id)).await? {
            ChatResponse::LeftMemberUser { group_info } => Ok(group_info),
            r => unexpected("Error leaving group", r),
        }
    }

    /// Members of a group
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, ClientError> {
        match self.send_chat_cmd(&ChatCommand::ListMembers(group_id)).await? {
            ChatResponse::GroupMembers { group } => Ok(group.members),
            r => unexpected("Error getting group members", r),
        }
    }

    /// Update a group's profile
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Command` on an unexpected answer.
    pub async fn api_update_group(
        &self,
        group_id: i64,
        group_profile: GroupProfile,
    ) -> Result<GroupInfo, ClientError> {
        let cmd = ChatCommand::UpdateGroupProfile {
            group_id,
            group_profile,
        };
        match self.send_chat_cmd(&cmd).await? {
            ChatResponse::GroupUpdated { to_group, .. } => Ok(to_group),
            r => unexpected("Error updating group", r),
        }
    }
}
