use std::time::Duration;

use angelia_auth::PasswordAuthenticator;
use angelia_messenger::conversation::ConversationId;
use angelia_messenger::data_access::MessageStore;
use angelia_messenger::messenger::Messenger;
use angelia_messenger::{LastMessage, MessageKind};
use mock_db::Db;
use tokio::time::sleep;

fn new_app() -> (Messenger<Db, Db, PasswordAuthenticator<Db>>, Db) {
    let db = Db::new();
    let app = Messenger::new(db.clone(), db.clone(), PasswordAuthenticator::new(db.clone()));
    (app, db)
}

// keeps store-assigned timestamps strictly increasing between sends
async fn settle() {
    sleep(Duration::from_millis(2)).await;
}

#[tokio::test]
async fn aggregates_an_alternating_exchange_into_one_conversation() {
    let (app, _db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let bob = app.sign_up("bob", "Manager", "secret1".into()).await.unwrap();

    for i in 1..=3 {
        app.send_message(alice, bob, format!("from alice {i}"), MessageKind::Text).await.unwrap();
        settle().await;
        app.send_message(bob, alice, format!("from bob {i}"), MessageKind::Text).await.unwrap();
        settle().await;
    }

    let conversations = app.list_conversations(&alice).await.unwrap();
    assert_eq!(conversations.len(), 1);

    let conversation = &conversations[0];
    assert_eq!(conversation.counterpart_id, bob);
    assert_eq!(conversation.counterpart_nickname(), "bob");
    let last = conversation.last_message.as_ref().unwrap();
    assert_eq!(last.sender, bob);
    assert_eq!(last.text, "from bob 3");
    assert_eq!(conversation.unread_count, 3);

    let bobs_view = app.list_conversations(&bob).await.unwrap();
    assert_eq!(bobs_view.len(), 1);
    assert_eq!(bobs_view[0].counterpart_nickname(), "alice");
    assert_eq!(bobs_view[0].unread_count, 3);
}

#[tokio::test]
async fn sorts_by_recency_and_is_stable_across_calls() {
    let (app, _db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let bob = app.sign_up("bob", "Manager", "secret1".into()).await.unwrap();
    let carol = app.sign_up("carol", "Designer", "secret1".into()).await.unwrap();
    let dave = app.sign_up("dave", "Artist", "secret1".into()).await.unwrap();

    app.send_message(alice, bob, "oldest".into(), MessageKind::Text).await.unwrap();
    settle().await;
    app.send_message(alice, carol, "newer".into(), MessageKind::Text).await.unwrap();
    settle().await;
    app.send_message(dave, alice, "newest".into(), MessageKind::Text).await.unwrap();

    let conversations = app.list_conversations(&alice).await.unwrap();
    let counterparts: Vec<_> = conversations.iter().map(|c| c.counterpart_nickname().to_owned()).collect();
    assert_eq!(counterparts, ["dave", "carol", "bob"]);

    assert!(conversations.windows(2).all(|pair| pair[0].last_activity >= pair[1].last_activity));

    // no intervening writes, so a second read returns the same list
    assert_eq!(app.list_conversations(&alice).await.unwrap(), conversations);
}

#[tokio::test]
async fn counts_unread_per_viewer_and_marks_read() {
    let (app, _db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let bob = app.sign_up("bob", "Manager", "secret1".into()).await.unwrap();

    app.send_message(bob, alice, "one".into(), MessageKind::Text).await.unwrap();
    settle().await;
    app.send_message(bob, alice, "two".into(), MessageKind::Text).await.unwrap();
    settle().await;
    app.send_message(alice, bob, "three".into(), MessageKind::Text).await.unwrap();

    let conversation = ConversationId::between(alice, bob).unwrap();

    assert_eq!(app.list_conversations(&alice).await.unwrap()[0].unread_count, 2);
    assert_eq!(app.list_conversations(&bob).await.unwrap()[0].unread_count, 1);

    assert_eq!(app.mark_read(&conversation, &alice).await.unwrap(), 2);
    assert_eq!(app.list_conversations(&alice).await.unwrap()[0].unread_count, 0);
    // the other participant's unread state is untouched
    assert_eq!(app.list_conversations(&bob).await.unwrap()[0].unread_count, 1);

    // idempotent
    assert_eq!(app.mark_read(&conversation, &alice).await.unwrap(), 0);

    let messages = app.conversation_messages(&conversation).await.unwrap();
    assert!(messages.iter().filter(|m| m.receiver == alice).all(|m| m.is_read));
    assert!(messages.iter().filter(|m| m.receiver == bob).all(|m| !m.is_read));
}

#[tokio::test]
async fn lists_conversations_opened_before_any_message() {
    let (app, _db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let bob = app.sign_up("bob", "Manager", "secret1".into()).await.unwrap();

    let conversation = app.open_conversation(alice, bob).await.unwrap();
    // opening twice changes nothing
    assert_eq!(app.open_conversation(bob, alice).await.unwrap(), conversation);

    let conversations = app.list_conversations(&alice).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert!(conversations[0].last_message.is_none());
    assert_eq!(conversations[0].unread_count, 0);
    assert_eq!(conversations[0].counterpart_nickname(), "bob");
    let created_at = conversations[0].last_activity;

    settle().await;
    app.send_message(bob, alice, "finally".into(), MessageKind::Text).await.unwrap();

    let conversations = app.list_conversations(&alice).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].last_message.as_ref().unwrap().text, "finally");
    assert!(conversations[0].last_activity > created_at);
}

#[tokio::test]
async fn degrades_to_empty_display_fields_when_counterpart_is_missing() {
    let (app, db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let ghost = uuid::Uuid::new_v4();

    let conversation = ConversationId::between(alice, ghost).unwrap();
    db.open_conversation(&conversation).await.unwrap();

    let conversations = app.list_conversations(&alice).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].counterpart_id, ghost);
    assert!(conversations[0].counterpart.is_none());
    assert_eq!(conversations[0].counterpart_nickname(), "");
}

#[tokio::test]
async fn rederives_summaries_from_the_message_log() {
    let (app, db) = new_app();
    let alice = app.sign_up("alice", "Engineer", "secret1".into()).await.unwrap();
    let bob = app.sign_up("bob", "Manager", "secret1".into()).await.unwrap();

    app.send_message(alice, bob, "first".into(), MessageKind::Text).await.unwrap();
    settle().await;
    app.send_message(bob, alice, "second".into(), MessageKind::Text).await.unwrap();

    // clobber the cached summary the way an interrupted writer would
    let conversation = ConversationId::between(alice, bob).unwrap();
    let stale = LastMessage {
        text: "stale".into(),
        sender: alice,
        sent_at: chrono::Utc::now() - chrono::Duration::hours(1),
        kind: MessageKind::Text,
    };
    db.update_summary(&conversation, &stale).await.unwrap();

    // aggregation trusts the log, not the cache
    let conversations = app.list_conversations(&alice).await.unwrap();
    let last = conversations[0].last_message.as_ref().unwrap();
    assert_eq!(last.text, "second");
    assert_eq!(last.sender, bob);
}
