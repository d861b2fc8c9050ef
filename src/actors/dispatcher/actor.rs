use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::messages::DispatcherCommand;
use crate::chat::{ConnectionId, ServerEvent, UserId};
use crate::presence::PresenceRegistry;

/// Routes live events. Owns the connection senders, the presence registry
/// and room membership; all three are only ever touched from the actor
/// loop, so presence lookups and deliveries cannot interleave with a
/// concurrent rebind.
pub struct Dispatcher {
    receiver: mpsc::UnboundedReceiver<DispatcherCommand>,
    pub(super) connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    pub(super) presence: PresenceRegistry,
    pub(super) rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl Dispatcher {
    pub fn new() -> (Self, DispatcherHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let dispatcher = Self {
            receiver,
            connections: HashMap::new(),
            presence: PresenceRegistry::new(),
            rooms: HashMap::new(),
        };

        (dispatcher, DispatcherHandle { sender })
    }

    pub async fn run(mut self) {
        info!("Realtime dispatcher started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                DispatcherCommand::Attach {
                    connection_id,
                    sender,
                } => {
                    self.handle_attach(connection_id, sender);
                }
                DispatcherCommand::Detach { connection_id } => {
                    self.handle_detach(connection_id);
                }
                DispatcherCommand::DeclareOnline {
                    user_id,
                    connection_id,
                } => {
                    self.handle_declare_online(user_id, connection_id);
                }
                DispatcherCommand::DeclareOffline { user_id } => {
                    self.handle_declare_offline(user_id);
                }
                DispatcherCommand::EmitTo { user_id, event } => {
                    self.handle_emit_to(user_id, event);
                }
                DispatcherCommand::JoinRoom {
                    connection_id,
                    room_id,
                } => {
                    self.handle_join_room(connection_id, room_id);
                }
                DispatcherCommand::LeaveRoom {
                    connection_id,
                    room_id,
                } => {
                    self.handle_leave_room(connection_id, room_id);
                }
                DispatcherCommand::OnlineUsers { respond_to } => {
                    let _ = respond_to.send(self.presence.online_users());
                }
            }
        }

        info!("Realtime dispatcher stopped");
    }
}

/// Cloneable handle to the dispatcher. Constructed once at process start
/// and passed to every component that emits live events, REST handlers
/// included. Event emission is fire-and-forget; a dead dispatcher is
/// logged, never propagated.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::UnboundedSender<DispatcherCommand>,
}

impl DispatcherHandle {
    fn send(&self, command: DispatcherCommand) {
        if self.sender.send(command).is_err() {
            warn!("Realtime dispatcher is gone, dropping command");
        }
    }

    pub fn attach(&self, connection_id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        self.send(DispatcherCommand::Attach {
            connection_id,
            sender,
        });
    }

    pub fn detach(&self, connection_id: ConnectionId) {
        self.send(DispatcherCommand::Detach { connection_id });
    }

    pub fn declare_online(&self, user_id: UserId, connection_id: ConnectionId) {
        self.send(DispatcherCommand::DeclareOnline {
            user_id,
            connection_id,
        });
    }

    pub fn declare_offline(&self, user_id: UserId) {
        self.send(DispatcherCommand::DeclareOffline { user_id });
    }

    /// Delivers `event` to `user_id`'s live connection if one is bound.
    /// An offline peer is the expected case, not a failure.
    pub fn emit_to(&self, user_id: UserId, event: ServerEvent) {
        self.send(DispatcherCommand::EmitTo { user_id, event });
    }

    pub fn join_room(&self, connection_id: ConnectionId, room_id: String) {
        self.send(DispatcherCommand::JoinRoom {
            connection_id,
            room_id,
        });
    }

    pub fn leave_room(&self, connection_id: ConnectionId, room_id: String) {
        self.send(DispatcherCommand::LeaveRoom {
            connection_id,
            room_id,
        });
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        let (respond_to, response) = oneshot::channel();
        self.send(DispatcherCommand::OnlineUsers { respond_to });
        response.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::PresenceStatus;
    use std::time::Duration;
    use uuid::Uuid;

    async fn next_event(receiver: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn status(user_id: UserId, status: PresenceStatus) -> ServerEvent {
        ServerEvent::UserStatus { user_id, status }
    }

    #[tokio::test]
    async fn delivers_to_the_bound_connection_only() {
        let (dispatcher, handle) = Dispatcher::new();
        tokio::spawn(dispatcher.run());

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();

        handle.attach(conn_a, tx_a);
        handle.attach(conn_b, tx_b);
        handle.declare_online(1, conn_a);
        handle.declare_online(2, conn_b);

        // The online-users query doubles as a barrier: the actor has
        // processed everything sent before it.
        let mut online = handle.online_users().await;
        online.sort();
        assert_eq!(online, vec![1, 2]);

        for receiver in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                next_event(receiver).await,
                status(1, PresenceStatus::Online)
            );
            assert_eq!(
                next_event(receiver).await,
                status(2, PresenceStatus::Online)
            );
        }

        handle.emit_to(2, ServerEvent::Typing { is_typing: true });
        handle.online_users().await;

        assert_eq!(
            next_event(&mut rx_b).await,
            ServerEvent::Typing { is_typing: true }
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn rebind_wins_and_stale_detach_keeps_the_user_online() {
        let (dispatcher, handle) = Dispatcher::new();
        tokio::spawn(dispatcher.run());

        let (tx_old, mut rx_old) = mpsc::channel(8);
        let (tx_new, mut rx_new) = mpsc::channel(8);
        let conn_old = Uuid::new_v4();
        let conn_new = Uuid::new_v4();

        handle.attach(conn_old, tx_old);
        handle.declare_online(1, conn_old);
        handle.attach(conn_new, tx_new);
        handle.declare_online(1, conn_new);

        // Closing the stale connection must not unbind the fresh one and
        // must not broadcast an offline status.
        handle.detach(conn_old);
        handle.emit_to(1, ServerEvent::Typing { is_typing: false });
        assert_eq!(handle.online_users().await, vec![1]);

        assert_eq!(
            next_event(&mut rx_old).await,
            status(1, PresenceStatus::Online)
        );
        assert_eq!(
            next_event(&mut rx_new).await,
            status(1, PresenceStatus::Online)
        );
        assert_eq!(
            next_event(&mut rx_new).await,
            ServerEvent::Typing { is_typing: false }
        );
        assert!(rx_new.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_of_a_bound_connection_broadcasts_offline() {
        let (dispatcher, handle) = Dispatcher::new();
        tokio::spawn(dispatcher.run());

        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();

        handle.attach(conn_a, tx_a);
        handle.declare_online(1, conn_a);
        handle.attach(conn_b, tx_b);
        handle.declare_online(2, conn_b);

        handle.detach(conn_a);
        assert_eq!(handle.online_users().await, vec![2]);

        assert_eq!(
            next_event(&mut rx_b).await,
            status(2, PresenceStatus::Online)
        );
        assert_eq!(
            next_event(&mut rx_b).await,
            status(1, PresenceStatus::Offline)
        );
    }

    #[tokio::test]
    async fn explicit_offline_broadcasts_without_detaching() {
        let (dispatcher, handle) = Dispatcher::new();
        tokio::spawn(dispatcher.run());

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let conn_a = Uuid::new_v4();

        handle.attach(conn_a, tx_a);
        handle.declare_online(1, conn_a);
        handle.declare_offline(1);
        assert!(handle.online_users().await.is_empty());

        // Still attached: the connection keeps receiving broadcasts.
        assert_eq!(
            next_event(&mut rx_a).await,
            status(1, PresenceStatus::Online)
        );
        assert_eq!(
            next_event(&mut rx_a).await,
            status(1, PresenceStatus::Offline)
        );
    }
}
