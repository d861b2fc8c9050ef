use std::collections::HashMap;

use crate::chat::{ConnectionId, UserId};

/// In-memory record of which users currently have a reachable live
/// connection. At most one entry per user; a re-register replaces the old
/// mapping (last connect wins).
///
/// The table is intentionally not persisted: presence is session-scoped,
/// and after a process restart every user is offline until it reconnects.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<UserId, ConnectionId>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the mapping for `user_id`, returning the
    /// replaced connection if there was one.
    pub fn register(&mut self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.entries.insert(user_id, connection_id)
    }

    /// Removes the mapping for `user_id`; a miss is a no-op.
    pub fn unregister(&mut self, user_id: UserId) -> Option<ConnectionId> {
        self.entries.remove(&user_id)
    }

    /// Removes the single entry (if any) bound to `connection_id`. Used
    /// when a transport closes without an explicit offline declaration.
    pub fn unregister_by_connection(&mut self, connection_id: ConnectionId) -> Option<UserId> {
        let user_id = self
            .entries
            .iter()
            .find(|(_, bound)| **bound == connection_id)
            .map(|(user_id, _)| *user_id)?;
        self.entries.remove(&user_id);
        Some(user_id)
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.entries.get(&user_id).copied()
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn register_then_lookup() {
        let mut registry = PresenceRegistry::new();
        let connection = Uuid::new_v4();

        assert_eq!(registry.lookup(1), None);
        assert_eq!(registry.register(1, connection), None);
        assert_eq!(registry.lookup(1), Some(connection));
        assert_eq!(registry.online_users(), vec![1]);
    }

    #[test]
    fn last_connect_wins_and_stale_unbind_is_a_noop() {
        let mut registry = PresenceRegistry::new();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        registry.register(1, c1);
        assert_eq!(registry.register(1, c2), Some(c1));
        assert_eq!(registry.lookup(1), Some(c2));

        // The stale connection closing must not unbind the fresh one.
        assert_eq!(registry.unregister_by_connection(c1), None);
        assert_eq!(registry.lookup(1), Some(c2));

        assert_eq!(registry.unregister_by_connection(c2), Some(1));
        assert_eq!(registry.lookup(1), None);
    }

    #[test]
    fn unregister_missing_user_is_a_noop() {
        let mut registry = PresenceRegistry::new();
        assert_eq!(registry.unregister(42), None);

        let connection = Uuid::new_v4();
        registry.register(42, connection);
        assert_eq!(registry.unregister(42), Some(connection));
        assert_eq!(registry.unregister(42), None);
    }
}
