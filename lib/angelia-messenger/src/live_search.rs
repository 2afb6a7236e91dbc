use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::authorization::Authenticator;
use crate::data_access::{Directory, MessageStore};
use crate::error::Result;
use crate::messenger::Messenger;
use crate::{User, UserId};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Search-as-you-type front end over [`Messenger::search_users`]: a query
/// only reaches the directory after the debounce window passes without a
/// newer submission, and every submission supersedes the previous one.
#[derive(Clone)]
pub struct LiveUserSearch<D, S: MessageStore, A> {
    messenger: Messenger<D, S, A>,
    current: Arc<Mutex<CancellationToken>>,
}

impl<D: Directory, S: MessageStore, A: Authenticator> LiveUserSearch<D, S, A> {
    pub fn new(messenger: Messenger<D, S, A>) -> Self {
        LiveUserSearch {
            messenger,
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// The returned channel yields at most one result and closes without
    /// yielding anything when a newer query arrives first; results of
    /// superseded queries are discarded, never merged.
    pub fn submit(&self, query: String, requester: UserId) -> mpsc::UnboundedReceiver<Result<Vec<User>>> {
        let token = CancellationToken::new();
        {
            let mut current = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            current.cancel();
            *current = token.clone();
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(SEARCH_DEBOUNCE) => {},
            }

            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = messenger.search_users(&query, &requester) => result,
            };

            let _ = sender.send(result);
        });

        receiver
    }
}
