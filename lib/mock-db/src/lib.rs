use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use angelia_auth::{CredentialStore, StoredCredentials};
use angelia_messenger::conversation::ConversationId;
use angelia_messenger::data_access::{ConversationRecord, Directory, MessageDraft, MessageStore};
use angelia_messenger::{LastMessage, Message, MessageId, User, UserId};
use angelia_utils::utils::CaseInsensitiveString;

#[derive(Debug, Error)]
pub enum Error {
    #[error("mock storage mutex poisoned")]
    ThreadPoisonError,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_value: PoisonError<T>) -> Self {
        Self::ThreadPoisonError
    }
}

/// In-memory reference store: one table per entity behind a mutex, the
/// whole thing cheaply cloneable. Ids and timestamps are assigned here,
/// store-side, like a hosted backend would.
#[derive(Clone)]
pub struct Db {
    users: Arc<Mutex<Vec<User>>>,
    messages: Arc<Mutex<Vec<Message>>>,
    conversations: Arc<Mutex<Vec<ConversationRecord>>>,
    credentials: Arc<Mutex<Vec<(UserId, StoredCredentials)>>>,
}

impl Db {
    pub fn new() -> Self {
        Db {
            users: Arc::new(Mutex::new(Vec::new())),
            messages: Arc::new(Mutex::new(Vec::new())),
            conversations: Arc::new(Mutex::new(Vec::new())),
            credentials: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory for Db {
    type Error = Error;

    async fn fetch_users(&self) -> Result<Vec<User>, Error> {
        Ok(self.users.lock()?.clone())
    }

    async fn create_user(&self, nickname: &str, profession: &str) -> Result<Option<UserId>, Error> {
        let mut users = self.users.lock()?;

        let wanted = CaseInsensitiveString::from(nickname);
        if users.iter().any(|user| CaseInsensitiveString::from(user.nickname.as_str()) == wanted) {
            return Ok(None);
        }

        let user = User {
            id: uuid::Uuid::new_v4(),
            nickname: nickname.to_owned(),
            profession: profession.to_owned(),
            avatar_url: String::new(),
            is_online: true,
            last_seen: None,
        };
        let user_id = user.id;
        users.push(user);
        Ok(Some(user_id))
    }

    async fn update_profile(&self, user_id: &UserId, nickname: &str, profession: &str) -> Result<(), Error> {
        let mut users = self.users.lock()?;
        if let Some(user) = users.iter_mut().find(|user| user.id == *user_id) {
            user.nickname = nickname.to_owned();
            user.profession = profession.to_owned();
        }
        Ok(())
    }

    async fn update_avatar(&self, user_id: &UserId, avatar_url: &str) -> Result<(), Error> {
        let mut users = self.users.lock()?;
        if let Some(user) = users.iter_mut().find(|user| user.id == *user_id) {
            user.avatar_url = avatar_url.to_owned();
        }
        Ok(())
    }

    async fn set_presence(&self, user_id: &UserId, online: bool) -> Result<(), Error> {
        let mut users = self.users.lock()?;
        if let Some(user) = users.iter_mut().find(|user| user.id == *user_id) {
            if user.is_online && !online {
                user.last_seen = Some(chrono::Utc::now());
            }
            user.is_online = online;
        }
        Ok(())
    }
}

impl MessageStore for Db {
    type Error = Error;

    async fn append(&self, draft: &MessageDraft) -> Result<Message, Error> {
        let message = Message {
            id: uuid::Uuid::new_v4(),
            sender: draft.sender,
            receiver: draft.receiver,
            conversation: draft.conversation,
            content: draft.content.clone(),
            sent_at: chrono::Utc::now(),
            is_read: false,
            kind: draft.kind,
        };
        self.messages.lock()?.push(message.clone());
        Ok(message)
    }

    async fn messages_in(&self, conversation: &ConversationId) -> Result<Vec<Message>, Error> {
        let mut res: Vec<Message> = self.messages.lock()?
            .iter()
            .filter(|message| message.conversation == *conversation)
            .cloned()
            .collect();
        res.sort_by_key(|message| message.sent_at);
        Ok(res)
    }

    async fn messages_since(&self, user_id: &UserId, starting_point: &MessageId) -> Result<Vec<Message>, Error> {
        let res = self.messages.lock()?
            .iter()
            .skip_while(|message| message.id != *starting_point)
            .skip(1)
            .filter(|message| message.sender == *user_id || message.receiver == *user_id)
            .cloned()
            .collect();
        Ok(res)
    }

    async fn mark_read(&self, conversation: &ConversationId, viewer: &UserId) -> Result<usize, Error> {
        let mut messages = self.messages.lock()?;
        let mut flipped = 0;
        for message in messages.iter_mut() {
            if message.conversation == *conversation && message.receiver == *viewer && !message.is_read {
                message.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn open_conversation(&self, conversation: &ConversationId) -> Result<ConversationRecord, Error> {
        let mut conversations = self.conversations.lock()?;
        if let Some(record) = conversations.iter().find(|record| record.id == *conversation) {
            return Ok(record.clone());
        }

        let record = ConversationRecord {
            id: *conversation,
            created_at: chrono::Utc::now(),
            last_message: None,
        };
        conversations.push(record.clone());
        Ok(record)
    }

    async fn conversations_of(&self, user_id: &UserId) -> Result<Vec<ConversationRecord>, Error> {
        let res = self.conversations.lock()?
            .iter()
            .filter(|record| record.id.contains(user_id))
            .cloned()
            .collect();
        Ok(res)
    }

    async fn update_summary(&self, conversation: &ConversationId, last_message: &LastMessage) -> Result<(), Error> {
        let mut conversations = self.conversations.lock()?;
        match conversations.iter().position(|record| record.id == *conversation) {
            Some(i) => conversations[i].last_message = Some(last_message.clone()),
            // first message without an eager open still creates the record
            None => conversations.push(ConversationRecord {
                id: *conversation,
                created_at: chrono::Utc::now(),
                last_message: Some(last_message.clone()),
            }),
        }
        Ok(())
    }
}

impl CredentialStore for Db {
    type Error = Error;

    async fn fetch_credentials(&self, user_id: &UserId) -> Result<Option<StoredCredentials>, Error> {
        let res = self.credentials.lock()?
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, credentials)| credentials.clone());
        Ok(res)
    }

    async fn store_credentials(&self, user_id: &UserId, credentials: StoredCredentials) -> Result<Option<StoredCredentials>, Error> {
        let mut table = self.credentials.lock()?;
        for record in table.iter_mut() {
            if record.0 == *user_id {
                let old = record.1.clone();
                record.1 = credentials;
                return Ok(Some(old));
            }
        }
        table.push((*user_id, credentials));
        Ok(None)
    }
}
