use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

pub type UserId = i32;
pub type ConnectionId = Uuid;

pub const MAX_BODY_LEN: usize = 5000;

/// Events a client may send over the live channel, as
/// `{"event": "...", "data": {...}}` JSON frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    DeclareOnline { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    DeclareOffline { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        sender_id: UserId,
        receiver_id: UserId,
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Typing { receiver_id: UserId, is_typing: bool },
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
}

/// Events the server pushes to a live connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    MessageAccepted { message_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        message_id: Uuid,
        sender_id: UserId,
        body: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MessageFailed { error: String },
    #[serde(rename_all = "camelCase")]
    Typing { is_typing: bool },
    #[serde(rename_all = "camelCase")]
    UserStatus {
        user_id: UserId,
        status: PresenceStatus,
    },
    #[serde(rename_all = "camelCase")]
    MessageRead { message_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MessagesRead { read_by_user_id: UserId },
    #[serde(rename_all = "camelCase")]
    MessageDeleted { message_id: Uuid },
    #[serde(rename_all = "camelCase")]
    ConversationDeleted { deleted_by_user_id: UserId },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A persisted chat message. `id` and `created_at` are assigned once by the
/// store; `read` only ever flips false -> true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl MessageRecord {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// The other participant relative to `viewer`.
    pub fn peer_of(&self, viewer: UserId) -> UserId {
        if self.sender_id == viewer {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    pub fn received_event(&self) -> ServerEvent {
        ServerEvent::MessageReceived {
            message_id: self.id,
            sender_id: self.sender_id,
            body: self.body.clone(),
            timestamp: self.created_at.timestamp_millis(),
            property_id: self.property_id.clone(),
        }
    }
}

/// Denormalized display fields for a user, owned by the external
/// auth/profile subsystem and mirrored into the store for reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Derived inbox row: latest message with a peer plus the viewer's unread
/// count. Computed on demand, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub peer: UserProfile,
    pub last_message: MessageRecord,
    pub unread_count: u64,
}

pub fn validate_body(body: &str) -> Result<(), ChatError> {
    if body.trim().is_empty() {
        return Err(ChatError::Validation(
            "message body must not be empty".to_string(),
        ));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(ChatError::Validation(format!(
            "message body exceeds {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(())
}
