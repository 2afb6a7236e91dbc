use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub mod authorization;
pub mod conversation;
pub mod data_access;
pub mod error;
pub mod live_search;
pub mod messenger;
pub mod subscriptions_handler;

pub use conversation::ConversationId;
pub use error::{Error, Result, ValidationError};

pub type MessageId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub profession: String,
    pub avatar_url: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub conversation: ConversationId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
    pub kind: MessageKind,
}

/// Denormalized summary of the most recent message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastMessage {
    pub text: String,
    pub sender: UserId,
    pub sent_at: DateTime<Utc>,
    pub kind: MessageKind,
}

impl LastMessage {
    pub fn of(message: &Message) -> Self {
        LastMessage {
            text: message.content.clone(),
            sender: message.sender,
            sent_at: message.sent_at,
            kind: message.kind,
        }
    }
}

/// Viewer-relative projection of a conversation, derived from its messages.
/// A cache over the message log, never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub counterpart_id: UserId,
    /// `None` when the counterpart profile could not be resolved; the
    /// conversation is still listed, with empty display fields.
    pub counterpart: Option<User>,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
    pub unread_count: usize,
}

impl Conversation {
    pub fn counterpart_nickname(&self) -> &str {
        self.counterpart.as_ref().map(|user| user.nickname.as_str()).unwrap_or("")
    }

    pub fn last_message_text(&self) -> &str {
        self.last_message.as_ref().map(|last| last.text.as_str()).unwrap_or("")
    }
}
