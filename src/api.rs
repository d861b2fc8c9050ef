use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::chat::{ConversationSummary, MessageRecord, ServerEvent, UserId, validate_body};
use crate::error::ChatError;
use crate::metrics::Metrics;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub receiver_id: Option<UserId>,
    pub message: Option<String>,
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: MessageRecord,
}

#[derive(Debug, Serialize)]
pub struct ConversationsEnvelope {
    pub success: bool,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConversationPageEnvelope {
    pub success: bool,
    pub messages: Vec<MessageRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusEnvelope {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationEnvelope {
    pub success: bool,
    pub message: String,
    pub deleted_count: u64,
}

/// POST /messages: the synchronous send path. Persists first; the live
/// notification to a bound receiver is a best-effort side effect that
/// cannot fail the request.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<MessageEnvelope>), ChatError> {
    let (Some(receiver_id), Some(message)) = (body.receiver_id, body.message) else {
        return Err(ChatError::Validation(
            "Please provide receiver and message".to_string(),
        ));
    };
    validate_body(&message)?;

    let record = state
        .store
        .create_message(caller_id, receiver_id, body.property_id, message)
        .await?;
    Metrics::chat_message_sent("rest");

    state
        .dispatcher
        .emit_to(receiver_id, record.received_event());

    Ok((
        StatusCode::CREATED,
        Json(MessageEnvelope {
            success: true,
            message: record,
        }),
    ))
}

/// GET /messages/conversations: the viewer's inbox.
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
) -> Result<Json<ConversationsEnvelope>, ChatError> {
    let conversations = state.store.list_conversations(caller_id).await?;

    Ok(Json(ConversationsEnvelope {
        success: true,
        conversations,
    }))
}

/// GET /messages/{peer_id}?page&limit, paginated history with one peer.
pub async fn conversation_with(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
    Path(peer_id): Path<UserId>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ConversationPageEnvelope>, ChatError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

    let result = state
        .store
        .conversation_page(caller_id, peer_id, page, limit)
        .await?;

    Ok(Json(ConversationPageEnvelope {
        success: true,
        pagination: Pagination {
            total: result.total,
            page,
            limit,
            pages: result.total.div_ceil(limit),
        },
        messages: result.messages,
    }))
}

/// PUT /messages/{message_id}/read
pub async fn mark_message_read(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller_id): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<Json<MessageEnvelope>, ChatError> {
    let record = state.store.mark_read(message_id).await?;

    state.dispatcher.emit_to(
        record.sender_id,
        ServerEvent::MessageRead {
            message_id: record.id,
        },
    );

    Ok(Json(MessageEnvelope {
        success: true,
        message: record,
    }))
}

/// PUT /messages/conversation/{peer_id}/read: everything the peer sent us.
pub async fn mark_conversation_read(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
    Path(peer_id): Path<UserId>,
) -> Result<Json<StatusEnvelope>, ChatError> {
    state
        .store
        .mark_conversation_read(caller_id, peer_id)
        .await?;

    state.dispatcher.emit_to(
        peer_id,
        ServerEvent::MessagesRead {
            read_by_user_id: caller_id,
        },
    );

    Ok(Json(StatusEnvelope {
        success: true,
        message: "Conversation marked as read".to_string(),
    }))
}

/// DELETE /messages/message/{message_id}: sender or receiver only.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<Json<StatusEnvelope>, ChatError> {
    let record = state.store.delete_message(message_id, caller_id).await?;

    state.dispatcher.emit_to(
        record.peer_of(caller_id),
        ServerEvent::MessageDeleted {
            message_id: record.id,
        },
    );

    Ok(Json(StatusEnvelope {
        success: true,
        message: "Message deleted successfully".to_string(),
    }))
}

/// DELETE /messages/conversation/{peer_id}: hard delete of the whole pair.
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(caller_id): AuthUser,
    Path(peer_id): Path<UserId>,
) -> Result<Json<DeleteConversationEnvelope>, ChatError> {
    let deleted_count = state.store.delete_conversation(caller_id, peer_id).await?;

    state.dispatcher.emit_to(
        peer_id,
        ServerEvent::ConversationDeleted {
            deleted_by_user_id: caller_id,
        },
    );

    Ok(Json(DeleteConversationEnvelope {
        success: true,
        message: format!(
            "Conversation deleted successfully. {} messages removed.",
            deleted_count
        ),
        deleted_count,
    }))
}
