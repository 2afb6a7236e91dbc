use anyhow::{anyhow, Context};
use futures::future::join_all;
use tokio::sync::mpsc;

use angelia_utils::utils::{log_internal_error, CaseInsensitiveString};

use crate::authorization::Authenticator;
use crate::conversation::ConversationId;
use crate::data_access::{ConversationRecord, Directory, MessageDraft, MessageStore};
use crate::error::{Error, Result, ValidationError};
use crate::subscriptions_handler::SubscriptionsHandler;
use crate::{Conversation, LastMessage, Message, MessageId, MessageKind, User, UserId};

pub const NICKNAME_MIN_CHARS: usize = 3;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// The messaging service. Collaborators are injected, not looked up: the
/// directory resolves profiles, the store holds the message log, the
/// authenticator guards credentials.
#[derive(Clone)]
pub struct Messenger<D, S: MessageStore, A> {
    directory: D,
    store: S,
    authenticator: A,
    subscriptions_handler: SubscriptionsHandler<S>,
}

impl<D: Directory, S: MessageStore, A> Messenger<D, S, A> {
    pub fn new(directory: D, store: S, authenticator: A) -> Self {
        let subscriptions_handler = SubscriptionsHandler::new(store.clone());
        Messenger { directory, store, authenticator, subscriptions_handler }
    }

    pub async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let user = self.directory
            .fetch_user(user_id).await
            .with_context(|| format!("couldn't fetch user {user_id}"))
            .map_err(Error::Transport)?;
        Ok(user)
    }

    pub async fn update_profile(&self, user_id: &UserId, nickname: &str, profession: &str) -> Result<()> {
        validate_nickname(nickname)?;

        self.fetch_user(user_id).await?.ok_or(Error::UserNotFound(*user_id))?;

        let taken = self.directory
            .is_nickname_taken(nickname, Some(user_id)).await
            .with_context(|| format!("couldn't check nickname {nickname}"))
            .map_err(Error::Transport)?;
        if taken {
            return Err(Error::NicknameTaken(nickname.to_owned()));
        }

        self.directory
            .update_profile(user_id, nickname, profession).await
            .with_context(|| format!("couldn't update profile of {user_id}"))
            .map_err(Error::Transport)
    }

    pub async fn update_avatar(&self, user_id: &UserId, avatar_url: &str) -> Result<()> {
        self.directory
            .update_avatar(user_id, avatar_url).await
            .with_context(|| format!("couldn't update avatar of {user_id}"))
            .map_err(Error::Transport)
    }

    pub async fn set_online(&self, user_id: &UserId, online: bool) -> Result<()> {
        self.directory
            .set_presence(user_id, online).await
            .with_context(|| format!("couldn't update presence of {user_id}"))
            .map_err(Error::Transport)
    }

    /// Eagerly creates the conversation record so the chat exists before the
    /// first message. Idempotent.
    pub async fn open_conversation(&self, viewer: UserId, other: UserId) -> Result<ConversationId> {
        let conversation = ConversationId::between(viewer, other)?;
        self.store
            .open_conversation(&conversation).await
            .with_context(|| format!("couldn't open conversation {conversation}"))
            .map_err(Error::Transport)?;
        Ok(conversation)
    }

    pub async fn send_message(&self, sender: UserId, receiver: UserId, content: String, kind: MessageKind) -> Result<Message> {
        let conversation = ConversationId::between(sender, receiver)?;
        let draft = MessageDraft { conversation, sender, receiver, content, kind };

        let message = self.store
            .append(&draft).await
            .with_context(|| format!("couldn't append message from {sender} to {receiver}"))
            .map_err(Error::Transport)?;

        if let Err(e) = self.subscriptions_handler.handle_new_message(&message) {
            log_internal_error(e);
        }

        // The append is durable at this point; a failed summary update is
        // reported but heals on the next aggregation read.
        let summary = LastMessage::of(&message);
        if let Err(e) = self.store.update_summary(&conversation, &summary).await {
            return Err(Error::PartialWrite {
                conversation,
                message: message.id,
                cause: anyhow::Error::new(e),
            });
        }

        Ok(message)
    }

    pub async fn conversation_messages(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        self.store
            .messages_in(conversation).await
            .with_context(|| format!("couldn't load messages of conversation {conversation}"))
            .map_err(Error::Transport)
    }

    pub async fn mark_read(&self, conversation: &ConversationId, viewer: &UserId) -> Result<usize> {
        self.store
            .mark_read(conversation, viewer).await
            .with_context(|| format!("couldn't mark conversation {conversation} read for {viewer}"))
            .map_err(Error::Transport)
    }

    /// One summary per conversation the viewer participates in, newest
    /// activity first, ties broken by conversation id for a total order.
    pub async fn list_conversations(&self, viewer: &UserId) -> Result<Vec<Conversation>> {
        let records = self.store
            .conversations_of(viewer).await
            .with_context(|| format!("couldn't fetch conversations of {viewer}"))
            .map_err(Error::Transport)?;

        let loaded = join_all(
            records.into_iter().map(|record| self.load_conversation(record, viewer)),
        ).await;

        let mut conversations = loaded.into_iter().collect::<Result<Vec<_>>>()?;
        conversations.sort_by(|a, b| {
            b.last_activity.cmp(&a.last_activity).then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }

    async fn load_conversation(&self, record: ConversationRecord, viewer: &UserId) -> Result<Conversation> {
        let counterpart_id = record.id
            .counterpart_of(viewer)
            .ok_or_else(|| Error::Transport(anyhow!("conversation {} does not involve {viewer}", record.id)))?;

        let messages = self.store
            .messages_in(&record.id).await
            .with_context(|| format!("couldn't load messages of conversation {}", record.id))
            .map_err(Error::Transport)?;

        let unread_count = messages.iter()
            .filter(|message| message.receiver == *viewer && !message.is_read)
            .count();

        // Resolved by comparing store-assigned timestamps; append order is
        // not authoritative under concurrent senders.
        let last_message = messages.iter()
            .max_by_key(|message| message.sent_at)
            .map(LastMessage::of);

        let last_activity = last_message
            .as_ref()
            .map(|last| last.sent_at)
            .unwrap_or(record.created_at);

        // A failed profile join degrades this conversation's display fields
        // instead of dropping it from the list.
        let counterpart = match self.directory.fetch_user(&counterpart_id).await {
            Ok(user) => user,
            Err(e) => {
                log_internal_error(
                    anyhow::Error::new(e)
                        .context(format!("couldn't resolve counterpart {counterpart_id}")),
                );
                None
            }
        };

        Ok(Conversation {
            id: record.id,
            counterpart_id,
            counterpart,
            last_message,
            last_activity,
            unread_count,
        })
    }

    /// Empty queries return nothing rather than everything; the requester is
    /// never part of the result.
    pub async fn search_users(&self, query: &str, requester: &UserId) -> Result<Vec<User>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.directory
            .search_by_nickname(query).await
            .with_context(|| format!("couldn't search users by {query:?}"))
            .map_err(Error::Transport)?;

        Ok(users.into_iter().filter(|user| user.id != *requester).collect())
    }

    pub async fn subscribe(&self, user_id: UserId, starting_point: Option<MessageId>) -> Result<mpsc::UnboundedReceiver<Message>> {
        self.subscriptions_handler
            .subscribe_new_messages(user_id, starting_point).await
            .map_err(Error::Transport)
    }
}

impl<D: Directory, S: MessageStore, A: Authenticator> Messenger<D, S, A> {
    pub async fn sign_up(&self, nickname: &str, profession: &str, password: String) -> Result<UserId> {
        validate_nickname(nickname)?;
        validate_password(&password)?;

        let user_id = self.directory
            .create_user(nickname, profession).await
            .with_context(|| format!("couldn't create user {nickname}"))
            .map_err(Error::Transport)?
            .ok_or_else(|| Error::NicknameTaken(nickname.to_owned()))?;

        self.authenticator
            .register(&user_id, password).await
            .with_context(|| format!("couldn't register credentials of {nickname}"))
            .map_err(Error::Transport)?;

        Ok(user_id)
    }

    pub async fn sign_in(&self, nickname: &str, password: String) -> Result<Option<UserId>> {
        let user_id = match self.directory
            .find_by_nickname(nickname).await
            .with_context(|| format!("couldn't look up nickname {nickname}"))
            .map_err(Error::Transport)?
        {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        let verified = self.authenticator
            .verify(&user_id, password).await
            .with_context(|| format!("couldn't verify credentials of {user_id}"))
            .map_err(Error::Transport)?;

        Ok(verified.then_some(user_id))
    }
}

/// In-memory filter over an already aggregated list: case-insensitive
/// substring match on the counterpart nickname or the last message text.
/// Preserves the input order; an empty query filters nothing out.
pub fn filter_conversations(conversations: &[Conversation], query: &str) -> Vec<Conversation> {
    if query.is_empty() {
        return conversations.to_vec();
    }

    let query = CaseInsensitiveString::from(query);
    conversations
        .iter()
        .filter(|conversation| {
            conversation.counterpart_nickname().to_lowercase().contains(query.as_str())
                || conversation.last_message_text().to_lowercase().contains(query.as_str())
        })
        .cloned()
        .collect()
}

pub fn validate_nickname(nickname: &str) -> std::result::Result<(), ValidationError> {
    if nickname.chars().count() < NICKNAME_MIN_CHARS {
        return Err(ValidationError::NicknameTooShort);
    }
    if !nickname.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ValidationError::NicknameBadCharacter);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> std::result::Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}
