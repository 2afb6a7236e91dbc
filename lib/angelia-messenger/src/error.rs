use thiserror::Error;

use crate::conversation::ConversationId;
use crate::messenger::{NICKNAME_MIN_CHARS, PASSWORD_MIN_CHARS};
use crate::{MessageId, UserId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("nickname '{0}' is already taken")]
    NicknameTaken(String),
    #[error("no user with id {0}")]
    UserNotFound(UserId),
    #[error("storage request failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("message {message} was stored but the summary of conversation {conversation} was not updated: {cause:#}")]
    PartialWrite {
        conversation: ConversationId,
        message: MessageId,
        cause: anyhow::Error,
    },
}

/// Rejected before any collaborator call; no partial state is left behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a conversation requires two distinct participants")]
    SelfConversation,
    #[error("nickname must be at least {} characters long", NICKNAME_MIN_CHARS)]
    NicknameTooShort,
    #[error("nickname may only contain letters, digits and underscores")]
    NicknameBadCharacter,
    #[error("password must be at least {} characters long", PASSWORD_MIN_CHARS)]
    PasswordTooShort,
}
