use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use uuid::Uuid;

use crate::chat::{ConversationSummary, MessageRecord, UserId, UserProfile};
use crate::error::ChatError;

#[derive(Debug)]
pub struct ConversationPage {
    pub messages: Vec<MessageRecord>,
    pub total: u64,
}

/// Storage engine behind the store actor. Message ids are UUIDv7 so id
/// order tracks creation order, which makes the timestamp tie-break on id
/// well defined.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: BTreeMap<Uuid, MessageRecord>,
    users: HashMap<UserId, UserProfile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&mut self, profile: UserProfile) {
        self.users.insert(profile.id, profile);
    }

    pub fn create_message(
        &mut self,
        sender_id: UserId,
        receiver_id: UserId,
        property_id: Option<String>,
        body: String,
    ) -> MessageRecord {
        let record = MessageRecord {
            id: Uuid::now_v7(),
            sender_id,
            receiver_id,
            property_id,
            body,
            created_at: Utc::now(),
            read: false,
        };
        self.messages.insert(record.id, record.clone());
        record
    }

    pub fn message(&self, message_id: Uuid) -> Result<MessageRecord, ChatError> {
        self.messages
            .get(&message_id)
            .cloned()
            .ok_or(ChatError::NotFound("message"))
    }

    pub fn mark_read(&mut self, message_id: Uuid) -> Result<MessageRecord, ChatError> {
        let message = self
            .messages
            .get_mut(&message_id)
            .ok_or(ChatError::NotFound("message"))?;
        message.read = true;
        Ok(message.clone())
    }

    /// Marks every unread message from `peer_id` to `viewer_id` as read and
    /// returns how many were updated. Running it again updates zero.
    pub fn mark_conversation_read(&mut self, viewer_id: UserId, peer_id: UserId) -> u64 {
        let mut updated = 0;
        for message in self.messages.values_mut() {
            if message.sender_id == peer_id && message.receiver_id == viewer_id && !message.read {
                message.read = true;
                updated += 1;
            }
        }
        updated
    }

    pub fn delete_message(
        &mut self,
        message_id: Uuid,
        caller_id: UserId,
    ) -> Result<MessageRecord, ChatError> {
        let message = self
            .messages
            .get(&message_id)
            .ok_or(ChatError::NotFound("message"))?;
        if !message.involves(caller_id) {
            return Err(ChatError::Forbidden("delete this message"));
        }
        self.messages
            .remove(&message_id)
            .ok_or(ChatError::NotFound("message"))
    }

    pub fn delete_conversation(&mut self, caller_id: UserId, peer_id: UserId) -> u64 {
        let before = self.messages.len();
        self.messages
            .retain(|_, message| !message.between(caller_id, peer_id));
        (before - self.messages.len()) as u64
    }

    /// Messages between `viewer_id` and `peer_id`, ascending by creation
    /// time (ties by id), one page at a time. Pages are 1-based.
    pub fn conversation_page(
        &self,
        viewer_id: UserId,
        peer_id: UserId,
        page: u64,
        limit: u64,
    ) -> ConversationPage {
        let mut messages: Vec<MessageRecord> = self
            .messages
            .values()
            .filter(|message| message.between(viewer_id, peer_id))
            .cloned()
            .collect();
        messages.sort_by_key(|message| (message.created_at, message.id));

        let total = messages.len() as u64;
        let skip = (page.max(1) - 1).saturating_mul(limit) as usize;
        let messages = messages
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .collect();

        ConversationPage { messages, total }
    }

    /// Inbox view for `viewer_id`: one row per peer with the latest message
    /// and the viewer's unread count, newest conversation first. Peers with
    /// no profile in the directory are dropped.
    pub fn list_conversations(&self, viewer_id: UserId) -> Vec<ConversationSummary> {
        let mut groups: HashMap<UserId, (MessageRecord, u64)> = HashMap::new();

        for message in self.messages.values() {
            if !message.involves(viewer_id) {
                continue;
            }
            let peer_id = message.peer_of(viewer_id);
            let unread = u64::from(message.receiver_id == viewer_id && !message.read);

            groups
                .entry(peer_id)
                .and_modify(|(last, unread_count)| {
                    if (message.created_at, message.id) > (last.created_at, last.id) {
                        *last = message.clone();
                    }
                    *unread_count += unread;
                })
                .or_insert_with(|| (message.clone(), unread));
        }

        let mut summaries: Vec<ConversationSummary> = groups
            .into_iter()
            .filter_map(|(peer_id, (last_message, unread_count))| {
                // Orphaned messages (peer no longer resolvable) are excluded
                // rather than shown with a synthesized user.
                self.users.get(&peer_id).map(|profile| ConversationSummary {
                    peer: profile.clone(),
                    last_message,
                    unread_count,
                })
            })
            .collect();

        summaries.sort_by(|a, b| {
            (b.last_message.created_at, b.last_message.id)
                .cmp(&(a.last_message.created_at, a.last_message.id))
        });
        summaries
    }
}
