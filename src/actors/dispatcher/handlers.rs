use tokio::sync::mpsc;
use tracing::{debug, info};

use super::actor::Dispatcher;
use crate::chat::{ConnectionId, PresenceStatus, ServerEvent, UserId};

impl Dispatcher {
    pub(super) fn handle_attach(
        &mut self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        self.connections.insert(connection_id, sender);
        debug!("Connection {} attached", connection_id);
    }

    pub(super) fn handle_detach(&mut self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        for members in self.rooms.values_mut() {
            members.remove(&connection_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());

        // Only broadcast offline if this connection was still the one bound
        // to its user; a stale connection from before a rebind is silent.
        if let Some(user_id) = self.presence.unregister_by_connection(connection_id) {
            info!("User {} is offline", user_id);
            self.broadcast(ServerEvent::UserStatus {
                user_id,
                status: PresenceStatus::Offline,
            });
        }

        debug!("Connection {} detached", connection_id);
    }

    pub(super) fn handle_declare_online(&mut self, user_id: UserId, connection_id: ConnectionId) {
        if let Some(previous) = self.presence.register(user_id, connection_id) {
            if previous != connection_id {
                debug!(
                    "User {} rebound from connection {} to {}",
                    user_id, previous, connection_id
                );
            }
        }

        info!("User {} is online", user_id);
        self.broadcast(ServerEvent::UserStatus {
            user_id,
            status: PresenceStatus::Online,
        });
    }

    pub(super) fn handle_declare_offline(&mut self, user_id: UserId) {
        self.presence.unregister(user_id);

        info!("User {} went offline", user_id);
        self.broadcast(ServerEvent::UserStatus {
            user_id,
            status: PresenceStatus::Offline,
        });
    }

    pub(super) fn handle_emit_to(&self, user_id: UserId, event: ServerEvent) {
        let Some(connection_id) = self.presence.lookup(user_id) else {
            debug!("User {} not found or offline", user_id);
            return;
        };

        let Some(sender) = self.connections.get(&connection_id) else {
            debug!(
                "Connection {} for user {} is already gone",
                connection_id, user_id
            );
            return;
        };

        // Use try_send to avoid blocking the dispatch loop on a slow client
        match sender.try_send(event) {
            Ok(()) => {
                debug!("Event delivered to user {}", user_id);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Recipient {} event queue is full, dropping event", user_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Recipient {} channel is closed", user_id);
            }
        }
    }

    pub(super) fn handle_join_room(&mut self, connection_id: ConnectionId, room_id: String) {
        debug!("Connection {} joined room {}", connection_id, room_id);
        self.rooms.entry(room_id).or_default().insert(connection_id);
    }

    pub(super) fn handle_leave_room(&mut self, connection_id: ConnectionId, room_id: String) {
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
            debug!("Connection {} left room {}", connection_id, room_id);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        // Status updates go to every attached connection, bound or not.
        for sender in self.connections.values() {
            let _ = sender.try_send(event.clone());
        }
    }
}
