use tokio::sync::oneshot;
use uuid::Uuid;

use super::memory::ConversationPage;
use crate::chat::{ConversationSummary, MessageRecord, UserId, UserProfile};
use crate::error::ChatError;

#[derive(Debug)]
pub enum StoreCommand {
    CreateMessage {
        sender_id: UserId,
        receiver_id: UserId,
        property_id: Option<String>,
        body: String,
        respond_to: oneshot::Sender<Result<MessageRecord, ChatError>>,
    },
    ConversationPage {
        viewer_id: UserId,
        peer_id: UserId,
        page: u64,
        limit: u64,
        respond_to: oneshot::Sender<Result<ConversationPage, ChatError>>,
    },
    ListConversations {
        viewer_id: UserId,
        respond_to: oneshot::Sender<Result<Vec<ConversationSummary>, ChatError>>,
    },
    MarkRead {
        message_id: Uuid,
        respond_to: oneshot::Sender<Result<MessageRecord, ChatError>>,
    },
    MarkConversationRead {
        viewer_id: UserId,
        peer_id: UserId,
        respond_to: oneshot::Sender<Result<u64, ChatError>>,
    },
    DeleteMessage {
        message_id: Uuid,
        caller_id: UserId,
        respond_to: oneshot::Sender<Result<MessageRecord, ChatError>>,
    },
    DeleteConversation {
        caller_id: UserId,
        peer_id: UserId,
        respond_to: oneshot::Sender<Result<u64, ChatError>>,
    },
    UpsertUser {
        profile: UserProfile,
    },
}
