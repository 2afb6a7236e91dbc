use serde::{Serialize, Serializer};

use crate::error::ValidationError;
use crate::UserId;

/// Canonical identifier of a two-party conversation: the unordered pair of
/// participants, stored smaller id first so that both sides derive the same
/// key without coordinating. Renders as `"{min}_{max}"`; `_` cannot occur
/// inside a hyphenated UUID, so distinct pairs never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId {
    first: UserId,
    second: UserId,
}

impl ConversationId {
    pub fn between(a: UserId, b: UserId) -> Result<Self, ValidationError> {
        if a == b {
            return Err(ValidationError::SelfConversation);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(ConversationId { first, second })
    }

    pub fn participants(&self) -> [UserId; 2] {
        [self.first, self.second]
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.first == *user_id || self.second == *user_id
    }

    /// The participant that is not the viewer; `None` if the viewer is not
    /// part of this conversation.
    pub fn counterpart_of(&self, viewer: &UserId) -> Option<UserId> {
        if self.first == *viewer {
            Some(self.second)
        } else if self.second == *viewer {
            Some(self.first)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.first, self.second)
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
