use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::broadcast::Sender;
use tokio::sync::mpsc;

use angelia_utils::async_utils;
use angelia_utils::utils::log_internal_error;

use crate::data_access::MessageStore;
use crate::{Message, MessageId, UserId};

const SUBSCRIPTIONS_CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

/// Push-model change notification: one broadcast channel per subscribed
/// user, fanned out on every appended message. Feeds both the open-chat
/// view and the conversation-list view.
#[derive(Clone)]
pub struct SubscriptionsHandler<S: MessageStore> {
    store: S,
    new_messages: Arc<RwLock<HashMap<UserId, Sender<Message>>>>,
}

impl<S: MessageStore> SubscriptionsHandler<S> {
    pub fn new(store: S) -> Self {
        let subscriptions: Arc<RwLock<HashMap<UserId, Sender<Message>>>> = Arc::new(RwLock::new(HashMap::new()));

        Self::spawn_cleanup_job(subscriptions.clone());

        SubscriptionsHandler { store, new_messages: subscriptions }
    }

    pub async fn subscribe_new_messages(&self, user_id: UserId, starting_point: Option<MessageId>) -> anyhow::Result<mpsc::UnboundedReceiver<Message>> {
        let subscription = {
            let mut subscriptions_lock = match self.new_messages.write() {
                Ok(res) => res,
                Err(e) => bail!("could not lock subscriptions for write: {e}"),
            };

            subscriptions_lock
                .entry(user_id)
                .or_insert_with(|| tokio::sync::broadcast::channel(100).0)
                .subscribe()
        };

        match starting_point {
            None => {
                // no replay needed, simply convert broadcast to an unbounded channel
                Ok(async_utils::pipe_broadcast(subscription, |message| Some(message)))
            },
            Some(starting_point) => {
                let missed_messages = self.store.messages_since(&user_id, &starting_point).await?;
                let (sender, receiver) = mpsc::unbounded_channel();

                let mut already_sent = HashSet::new();
                for message in missed_messages {
                    already_sent.insert(message.id);
                    sender.send(message)?; // receiver can't be dropped at this point, propagate for debugging
                }

                let live = async_utils::pipe_broadcast(subscription, move |message: Message| {
                    if already_sent.contains(&message.id) { None } else { Some(message) }
                });

                async_utils::redirect_unbounded_channel(live, sender);
                Ok(receiver)
            },
        }
    }

    pub fn handle_new_message(&self, message: &Message) -> anyhow::Result<()> {
        let subscriptions_read = match self.new_messages.read() {
            Ok(read_lock) => read_lock,
            Err(e) => bail!("could not lock subscriptions for read: {e}"),
        };

        // participants are distinct by construction of the conversation id
        for participant in [message.sender, message.receiver] {
            if let Some(sender) = subscriptions_read.get(&participant) {
                Self::send_to_subscribers(sender, message)
                    .with_context(|| format!("couldn't fan out message to subscribers of {participant}"))?;
            }
        }

        Ok(())
    }

    fn spawn_cleanup_job(subscriptions: Arc<RwLock<HashMap<UserId, Sender<Message>>>>) {
        // Periodically removes channels whose subscribers are all gone
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(SUBSCRIPTIONS_CLEANUP_INTERVAL).await;
                match subscriptions.write() {
                    Ok(mut write_lock) => {
                        write_lock.retain(|_, sender| sender.receiver_count() > 0);
                        write_lock.shrink_to_fit();
                    },
                    Err(e) => log_internal_error(e),
                }
            }
        });
    }

    fn send_to_subscribers<T: Clone>(sender: &Sender<T>, event: &T) -> anyhow::Result<()> {
        match sender.send(event.clone()) {
            Ok(_) => Ok(()),
            Err(e) => bail!("{e}"),
        }
    }
}
