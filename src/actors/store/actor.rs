use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use super::memory::{ConversationPage, MemoryStore};
use super::messages::StoreCommand;
use crate::chat::{ConversationSummary, MessageRecord, UserId, UserProfile};
use crate::error::ChatError;
use crate::metrics::Metrics;

/// Owns the persisted message store. Every operation arrives as a command
/// with a oneshot responder, so single-record read-then-write sequences are
/// serialized by the actor loop.
pub struct StoreActor {
    receiver: mpsc::UnboundedReceiver<StoreCommand>,
    store: MemoryStore,
}

impl StoreActor {
    pub fn new(seed_users: Vec<UserProfile>) -> (Self, StoreHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut store = MemoryStore::new();
        for profile in seed_users {
            store.upsert_user(profile);
        }

        (Self { receiver, store }, StoreHandle { sender })
    }

    pub async fn run(mut self) {
        info!("Message store actor started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                StoreCommand::CreateMessage {
                    sender_id,
                    receiver_id,
                    property_id,
                    body,
                    respond_to,
                } => {
                    let record = self
                        .store
                        .create_message(sender_id, receiver_id, property_id, body);
                    let _ = respond_to.send(Ok(record));
                }
                StoreCommand::ConversationPage {
                    viewer_id,
                    peer_id,
                    page,
                    limit,
                    respond_to,
                } => {
                    let page = self.store.conversation_page(viewer_id, peer_id, page, limit);
                    let _ = respond_to.send(Ok(page));
                }
                StoreCommand::ListConversations {
                    viewer_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(Ok(self.store.list_conversations(viewer_id)));
                }
                StoreCommand::MarkRead {
                    message_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.store.mark_read(message_id));
                }
                StoreCommand::MarkConversationRead {
                    viewer_id,
                    peer_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(Ok(self.store.mark_conversation_read(viewer_id, peer_id)));
                }
                StoreCommand::DeleteMessage {
                    message_id,
                    caller_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.store.delete_message(message_id, caller_id));
                }
                StoreCommand::DeleteConversation {
                    caller_id,
                    peer_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(Ok(self.store.delete_conversation(caller_id, peer_id)));
                }
                StoreCommand::UpsertUser { profile } => {
                    self.store.upsert_user(profile);
                }
            }
        }

        info!("Message store actor stopped");
    }
}

/// Cloneable handle to the store actor; the only way the rest of the
/// process reads or writes messages.
#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::UnboundedSender<StoreCommand>,
}

impl StoreHandle {
    async fn request<T>(
        &self,
        operation: &str,
        build: impl FnOnce(oneshot::Sender<Result<T, ChatError>>) -> StoreCommand,
    ) -> Result<T, ChatError> {
        let start = std::time::Instant::now();
        let (respond_to, response) = oneshot::channel();

        if self.sender.send(build(respond_to)).is_err() {
            return Err(ChatError::Persistence(
                "message store unavailable".to_string(),
            ));
        }

        let result = match response.await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Persistence(
                "message store dropped the request".to_string(),
            )),
        };

        Metrics::observe_store_op(operation, start.elapsed());
        result
    }

    pub async fn create_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        property_id: Option<String>,
        body: String,
    ) -> Result<MessageRecord, ChatError> {
        self.request("create_message", |respond_to| StoreCommand::CreateMessage {
            sender_id,
            receiver_id,
            property_id,
            body,
            respond_to,
        })
        .await
    }

    pub async fn conversation_page(
        &self,
        viewer_id: UserId,
        peer_id: UserId,
        page: u64,
        limit: u64,
    ) -> Result<ConversationPage, ChatError> {
        self.request("conversation_page", |respond_to| {
            StoreCommand::ConversationPage {
                viewer_id,
                peer_id,
                page,
                limit,
                respond_to,
            }
        })
        .await
    }

    pub async fn list_conversations(
        &self,
        viewer_id: UserId,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        self.request("list_conversations", |respond_to| {
            StoreCommand::ListConversations {
                viewer_id,
                respond_to,
            }
        })
        .await
    }

    pub async fn mark_read(&self, message_id: Uuid) -> Result<MessageRecord, ChatError> {
        self.request("mark_read", |respond_to| StoreCommand::MarkRead {
            message_id,
            respond_to,
        })
        .await
    }

    pub async fn mark_conversation_read(
        &self,
        viewer_id: UserId,
        peer_id: UserId,
    ) -> Result<u64, ChatError> {
        self.request("mark_conversation_read", |respond_to| {
            StoreCommand::MarkConversationRead {
                viewer_id,
                peer_id,
                respond_to,
            }
        })
        .await
    }

    pub async fn delete_message(
        &self,
        message_id: Uuid,
        caller_id: UserId,
    ) -> Result<MessageRecord, ChatError> {
        self.request("delete_message", |respond_to| StoreCommand::DeleteMessage {
            message_id,
            caller_id,
            respond_to,
        })
        .await
    }

    pub async fn delete_conversation(
        &self,
        caller_id: UserId,
        peer_id: UserId,
    ) -> Result<u64, ChatError> {
        self.request("delete_conversation", |respond_to| {
            StoreCommand::DeleteConversation {
                caller_id,
                peer_id,
                respond_to,
            }
        })
        .await
    }

    pub fn upsert_user(&self, profile: UserProfile) {
        if self
            .sender
            .send(StoreCommand::UpsertUser { profile })
            .is_err()
        {
            warn!("Message store is gone, dropping user profile update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_round_trips_through_the_actor() {
        let (actor, handle) = StoreActor::new(vec![UserProfile {
            id: 2,
            name: "Brik".to_string(),
            avatar: None,
        }]);
        tokio::spawn(actor.run());

        let record = handle
            .create_message(1, 2, None, "hello".to_string())
            .await
            .expect("create");
        assert_eq!(record.sender_id, 1);

        let page = handle.conversation_page(2, 1, 1, 50).await.expect("page");
        assert_eq!(page.total, 1);
        assert_eq!(page.messages[0], record);

        let updated = handle.mark_conversation_read(2, 1).await.expect("mark");
        assert_eq!(updated, 1);
        assert_eq!(handle.mark_conversation_read(2, 1).await.expect("mark"), 0);
    }

    #[tokio::test]
    async fn dead_actor_surfaces_a_persistence_error() {
        let (actor, handle) = StoreActor::new(Vec::new());
        drop(actor);

        let result = handle.create_message(1, 2, None, "hello".to_string()).await;
        assert!(matches!(result, Err(ChatError::Persistence(_))));
    }
}
