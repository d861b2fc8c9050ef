use std::sync::Arc;

use crate::actors::{
    connection_manager::ConnectionManager,
    dispatcher::{Dispatcher, DispatcherHandle},
    store::{StoreActor, StoreHandle},
};
use crate::chat::UserProfile;

/// Process-wide service handles. The dispatcher handle here is the one
/// emitter for the whole process: sessions and REST handlers alike reach
/// the live channel through it rather than any ambient global.
pub struct AppState {
    pub connection_manager: Arc<ConnectionManager>,
    pub dispatcher: DispatcherHandle,
    pub store: StoreHandle,
}

impl AppState {
    fn new(seed_users: Vec<UserProfile>) -> Self {
        let (store_actor, store) = StoreActor::new(seed_users);
        let (dispatcher_actor, dispatcher) = Dispatcher::new();
        let connection_manager =
            Arc::new(ConnectionManager::new(dispatcher.clone(), store.clone()));

        // Spawn actors
        tokio::spawn(dispatcher_actor.run());
        tokio::spawn(store_actor.run());

        Self {
            connection_manager,
            dispatcher,
            store,
        }
    }
}

pub struct AppStateBuilder {
    users: Vec<UserProfile>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self { users: Vec::new() }
    }

    /// Seeds the user directory with profiles owned by the auth/profile
    /// subsystem. Later updates go through `StoreHandle::upsert_user`.
    pub fn with_users(mut self, users: impl IntoIterator<Item = UserProfile>) -> Self {
        self.users.extend(users);
        self
    }

    pub fn build(self) -> AppState {
        AppState::new(self.users)
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
