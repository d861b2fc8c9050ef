use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::actors::dispatcher::DispatcherHandle;
use crate::actors::store::StoreHandle;
use crate::actors::user_session::handlers;
use crate::chat::{ClientEvent, ConnectionId, ServerEvent, UserId};
use crate::metrics::Metrics;

/// One live connection. Starts unbound; the client binds it to a user by
/// sending `declare-online`, and may rebind at any point.
pub struct UserSession {
    connection_id: ConnectionId,
    socket: WebSocket,
    dispatcher: DispatcherHandle,
    store: StoreHandle,
    event_receiver: mpsc::Receiver<ServerEvent>,
    event_sender: mpsc::Sender<ServerEvent>,
}

impl UserSession {
    pub fn new(socket: WebSocket, dispatcher: DispatcherHandle, store: StoreHandle) -> Self {
        const CHANNEL_BUFFER_SIZE: usize = 100;
        let (event_sender, event_receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let connection_id = Uuid::new_v4();

        dispatcher.attach(connection_id, event_sender.clone());

        Self {
            connection_id,
            socket,
            dispatcher,
            store,
            event_receiver,
            event_sender,
        }
    }

    pub async fn run(self) {
        let (mut ws_sender, mut ws_receiver) = self.socket.split();
        let connection_id = self.connection_id;
        let dispatcher = self.dispatcher.clone();
        let store = self.store.clone();
        let event_sender = self.event_sender.clone();
        let mut event_receiver = self.event_receiver;

        Metrics::websocket_connected();

        // Task to push outbound events (from the dispatcher to the socket)
        let mut send_task = tokio::spawn(async move {
            while let Some(event) = event_receiver.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            debug!(
                                "WebSocket send failed on connection {}, likely disconnected",
                                connection_id
                            );
                            break;
                        }
                        Metrics::websocket_message_sent();
                    }
                    Err(e) => {
                        error!(
                            "Failed to serialize event for connection {}: {}",
                            connection_id, e
                        );
                    }
                }
            }
        });

        // Task to handle inbound events (from the socket to the dispatcher)
        let dispatcher_for_recv = self.dispatcher.clone();
        let mut recv_task = tokio::spawn(async move {
            let mut bound_user: Option<UserId> = None;

            while let Some(Ok(Message::Text(text))) = ws_receiver.next().await {
                Metrics::websocket_message_received();

                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::DeclareOnline { user_id }) => {
                        bound_user = Some(user_id);
                        dispatcher_for_recv.declare_online(user_id, connection_id);
                    }
                    Ok(ClientEvent::DeclareOffline { user_id }) => {
                        if bound_user == Some(user_id) {
                            bound_user = None;
                        }
                        dispatcher_for_recv.declare_offline(user_id);
                    }
                    Ok(ClientEvent::SendMessage {
                        sender_id,
                        receiver_id,
                        body,
                        property_id,
                    }) => {
                        // Validate sender
                        if bound_user != Some(sender_id) {
                            warn!(
                                "Connection {} attempted to send as user {} while bound as {:?}",
                                connection_id, sender_id, bound_user
                            );
                            continue;
                        }

                        handlers::handle_send_message(
                            sender_id,
                            receiver_id,
                            body,
                            property_id,
                            &store,
                            &dispatcher_for_recv,
                            &event_sender,
                        )
                        .await;
                    }
                    Ok(ClientEvent::Typing {
                        receiver_id,
                        is_typing,
                    }) => {
                        dispatcher_for_recv.emit_to(receiver_id, ServerEvent::Typing { is_typing });
                    }
                    Ok(ClientEvent::JoinRoom { room_id }) => {
                        dispatcher_for_recv.join_room(connection_id, room_id);
                    }
                    Ok(ClientEvent::LeaveRoom { room_id }) => {
                        dispatcher_for_recv.leave_room(connection_id, room_id);
                    }
                    Err(e) => {
                        error!(
                            "Failed to parse event on connection {}: {}",
                            connection_id, e
                        );
                    }
                }
            }
        });

        // Wait for either task to complete
        tokio::select! {
            _ = &mut send_task => {
                debug!("Send task completed for connection {}", connection_id);
                recv_task.abort();
            }
            _ = &mut recv_task => {
                debug!("Receive task completed for connection {}", connection_id);
                send_task.abort();
            }
        }

        // Detach cleans the presence registry of any entry still bound to
        // this connection and broadcasts offline if one was.
        dispatcher.detach(connection_id);
        Metrics::websocket_disconnected();

        debug!("Session ended for connection {}", connection_id);
    }
}
