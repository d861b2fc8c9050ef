use axum::extract::ws::WebSocket;
use tracing::info;

use crate::actors::dispatcher::DispatcherHandle;
use crate::actors::store::StoreHandle;
use crate::actors::user_session::UserSession;

/// Accept path for the live channel: turns an upgraded WebSocket into a
/// running session wired to the dispatcher and the store.
pub struct ConnectionManager {
    dispatcher: DispatcherHandle,
    store: StoreHandle,
}

impl ConnectionManager {
    pub fn new(dispatcher: DispatcherHandle, store: StoreHandle) -> Self {
        Self { dispatcher, store }
    }

    pub async fn handle_connection(&self, socket: WebSocket) {
        info!("New live connection accepted");

        UserSession::new(socket, self.dispatcher.clone(), self.store.clone())
            .run()
            .await;
    }
}
