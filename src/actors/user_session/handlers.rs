use tokio::sync::mpsc;
use tracing::error;

use crate::actors::dispatcher::DispatcherHandle;
use crate::actors::store::StoreHandle;
use crate::chat::{ServerEvent, UserId, validate_body};
use crate::metrics::Metrics;

/// Send path for the live channel: validate, persist once, then ack the
/// sender and deliver to the receiver's connection if one is bound. A
/// persistence failure produces `message-failed` for the sender only; the
/// receiver never sees an unpersisted message.
pub async fn handle_send_message(
    sender_id: UserId,
    receiver_id: UserId,
    body: String,
    property_id: Option<String>,
    store: &StoreHandle,
    dispatcher: &DispatcherHandle,
    events: &mpsc::Sender<ServerEvent>,
) {
    if let Err(e) = validate_body(&body) {
        send_to_self(events, ServerEvent::MessageFailed {
            error: e.to_string(),
        })
        .await;
        return;
    }

    match store
        .create_message(sender_id, receiver_id, property_id, body)
        .await
    {
        Ok(record) => {
            Metrics::chat_message_sent("socket");
            send_to_self(events, ServerEvent::MessageAccepted {
                message_id: record.id,
            })
            .await;
            dispatcher.emit_to(receiver_id, record.received_event());
        }
        Err(e) => {
            error!(
                "Failed to persist message from {} to {}: {}",
                sender_id, receiver_id, e
            );
            send_to_self(events, ServerEvent::MessageFailed {
                error: e.to_string(),
            })
            .await;
        }
    }
}

async fn send_to_self(events: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if events.send(event).await.is_err() {
        error!("Failed to queue event for own connection, likely disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::dispatcher::Dispatcher;
    use crate::actors::store::StoreActor;
    use std::time::Duration;
    use uuid::Uuid;

    async fn next_event(receiver: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn send_acks_sender_and_delivers_to_bound_receiver() {
        let (store_actor, store) = StoreActor::new(Vec::new());
        tokio::spawn(store_actor.run());
        let (dispatcher_actor, dispatcher) = Dispatcher::new();
        tokio::spawn(dispatcher_actor.run());

        let (receiver_sender, mut receiver_events) = mpsc::channel(8);
        let receiver_conn = Uuid::new_v4();
        dispatcher.attach(receiver_conn, receiver_sender);
        dispatcher.declare_online(2, receiver_conn);
        dispatcher.online_users().await;

        // Drain the receiver's own online broadcast.
        assert!(matches!(
            next_event(&mut receiver_events).await,
            ServerEvent::UserStatus { user_id: 2, .. }
        ));

        let (events_sender, mut sender_events) = mpsc::channel(8);
        handle_send_message(
            1,
            2,
            "hello".to_string(),
            None,
            &store,
            &dispatcher,
            &events_sender,
        )
        .await;

        let ack = next_event(&mut sender_events).await;
        let ServerEvent::MessageAccepted { message_id } = ack else {
            panic!("expected message-accepted, got {:?}", ack);
        };

        match next_event(&mut receiver_events).await {
            ServerEvent::MessageReceived {
                message_id: delivered_id,
                sender_id,
                body,
                ..
            } => {
                assert_eq!(delivered_id, message_id);
                assert_eq!(sender_id, 1);
                assert_eq!(body, "hello");
            }
            other => panic!("expected message-received, got {:?}", other),
        }

        // Exactly one of each.
        assert!(sender_events.try_recv().is_err());
        assert!(receiver_events.try_recv().is_err());

        // Persisted and visible from both sides.
        let page = store.conversation_page(1, 2, 1, 50).await.expect("page");
        assert_eq!(page.total, 1);
        let mirrored = store.conversation_page(2, 1, 1, 50).await.expect("page");
        assert_eq!(mirrored.messages, page.messages);
    }

    #[tokio::test]
    async fn offline_receiver_still_gets_the_sender_acked() {
        let (store_actor, store) = StoreActor::new(Vec::new());
        tokio::spawn(store_actor.run());
        let (dispatcher_actor, dispatcher) = Dispatcher::new();
        tokio::spawn(dispatcher_actor.run());

        let (events_sender, mut sender_events) = mpsc::channel(8);
        handle_send_message(
            1,
            2,
            "hello".to_string(),
            None,
            &store,
            &dispatcher,
            &events_sender,
        )
        .await;

        assert!(matches!(
            next_event(&mut sender_events).await,
            ServerEvent::MessageAccepted { .. }
        ));
        assert_eq!(
            store
                .conversation_page(2, 1, 1, 50)
                .await
                .expect("page")
                .total,
            1
        );
    }

    #[tokio::test]
    async fn persistence_failure_fails_the_sender_only() {
        let (store_actor, store) = StoreActor::new(Vec::new());
        drop(store_actor);
        let (dispatcher_actor, dispatcher) = Dispatcher::new();
        tokio::spawn(dispatcher_actor.run());

        let (receiver_sender, mut receiver_events) = mpsc::channel(8);
        let receiver_conn = Uuid::new_v4();
        dispatcher.attach(receiver_conn, receiver_sender);
        dispatcher.declare_online(2, receiver_conn);
        dispatcher.online_users().await;
        assert!(matches!(
            next_event(&mut receiver_events).await,
            ServerEvent::UserStatus { .. }
        ));

        let (events_sender, mut sender_events) = mpsc::channel(8);
        handle_send_message(
            1,
            2,
            "hello".to_string(),
            None,
            &store,
            &dispatcher,
            &events_sender,
        )
        .await;

        assert!(matches!(
            next_event(&mut sender_events).await,
            ServerEvent::MessageFailed { .. }
        ));

        // The receiver never sees an unpersisted message.
        dispatcher.online_users().await;
        assert!(receiver_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_body_is_rejected_before_persistence() {
        let (store_actor, store) = StoreActor::new(Vec::new());
        tokio::spawn(store_actor.run());
        let (dispatcher_actor, dispatcher) = Dispatcher::new();
        tokio::spawn(dispatcher_actor.run());

        let (events_sender, mut sender_events) = mpsc::channel(8);
        handle_send_message(
            1,
            2,
            "   ".to_string(),
            None,
            &store,
            &dispatcher,
            &events_sender,
        )
        .await;

        assert!(matches!(
            next_event(&mut sender_events).await,
            ServerEvent::MessageFailed { .. }
        ));
        assert_eq!(
            store
                .conversation_page(1, 2, 1, 50)
                .await
                .expect("page")
                .total,
            0
        );
    }
}
