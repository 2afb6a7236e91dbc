use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conversation::ConversationId;
use crate::{LastMessage, Message, MessageId, MessageKind, User, UserId};

// written as a macro to use Self::Error
macro_rules! async_result {
    ($t:ty) => {
        impl Future<Output = Result<$t, Self::Error>> + Send
    };
}

/// What a caller hands to the store; the store assigns `id` and `sent_at`
/// and sets `is_read = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub conversation: ConversationId,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub kind: MessageKind,
}

/// Store-side conversation record, created eagerly when a chat is opened.
/// `last_message` is a write-time cache; aggregation re-derives summaries
/// from the message log and never trusts it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
}

pub trait Directory: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    fn fetch_users(&self) -> async_result!(Vec<User>);

    fn fetch_user(&self, user_id: &UserId) -> async_result!(Option<User>) {
        async move {
            let res = self
                .fetch_users().await?
                .into_iter()
                .find(|user| user.id == *user_id);
            Ok(res)
        }
    }

    fn find_by_nickname(&self, nickname: &str) -> async_result!(Option<UserId>) {
        async move {
            let wanted = nickname.to_lowercase();
            let res = self
                .fetch_users().await?
                .into_iter()
                .find(|user| user.nickname.to_lowercase() == wanted)
                .map(|user| user.id);
            Ok(res)
        }
    }

    fn search_by_nickname(&self, fragment: &str) -> async_result!(Vec<User>) {
        async move {
            let fragment = fragment.to_lowercase();
            let res = self
                .fetch_users().await?
                .into_iter()
                .filter(|user| user.nickname.to_lowercase().contains(&fragment))
                .collect();
            Ok(res)
        }
    }

    fn is_nickname_taken(&self, nickname: &str, excluding: Option<&UserId>) -> async_result!(bool) {
        async move {
            let wanted = nickname.to_lowercase();
            let res = self
                .fetch_users().await?
                .iter()
                .any(|user| user.nickname.to_lowercase() == wanted && Some(&user.id) != excluding);
            Ok(res)
        }
    }

    /// Returns `None` when the nickname is already taken (case-insensitive).
    fn create_user(&self, nickname: &str, profession: &str) -> async_result!(Option<UserId>);

    fn update_profile(&self, user_id: &UserId, nickname: &str, profession: &str) -> async_result!(());
    fn update_avatar(&self, user_id: &UserId, avatar_url: &str) -> async_result!(());
    fn set_presence(&self, user_id: &UserId, online: bool) -> async_result!(());
}

pub trait MessageStore: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    /// Durable append; assigns the id and the store-observed timestamp.
    fn append(&self, draft: &MessageDraft) -> async_result!(Message);

    /// All messages of one conversation, ascending by `sent_at`.
    fn messages_in(&self, conversation: &ConversationId) -> async_result!(Vec<Message>);

    /// Messages involving the user appended after the given one, for
    /// subscription replay.
    fn messages_since(&self, user_id: &UserId, starting_point: &MessageId) -> async_result!(Vec<Message>);

    /// Flips `is_read` on every unread message addressed to the viewer.
    /// Idempotent; returns how many messages were flipped.
    fn mark_read(&self, conversation: &ConversationId, viewer: &UserId) -> async_result!(usize);

    /// Idempotent eager create: returns the existing record or a fresh one.
    fn open_conversation(&self, conversation: &ConversationId) -> async_result!(ConversationRecord);

    fn conversations_of(&self, user_id: &UserId) -> async_result!(Vec<ConversationRecord>);

    /// Partial-field upsert of the cached summary.
    fn update_summary(&self, conversation: &ConversationId, last_message: &LastMessage) -> async_result!(());
}
