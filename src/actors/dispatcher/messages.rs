use tokio::sync::{mpsc, oneshot};

use crate::chat::{ConnectionId, ServerEvent, UserId};

#[derive(Debug)]
pub enum DispatcherCommand {
    Attach {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    },
    Detach {
        connection_id: ConnectionId,
    },
    DeclareOnline {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    DeclareOffline {
        user_id: UserId,
    },
    EmitTo {
        user_id: UserId,
        event: ServerEvent,
    },
    JoinRoom {
        connection_id: ConnectionId,
        room_id: String,
    },
    LeaveRoom {
        connection_id: ConnectionId,
        room_id: String,
    },
    OnlineUsers {
        respond_to: oneshot::Sender<Vec<UserId>>,
    },
}
