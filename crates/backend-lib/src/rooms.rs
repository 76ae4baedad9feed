// ============================
// crates/backend-lib/src/rooms.rs
// ============================
//! Room router: subscriptions of connections to per-pair rooms.
//!
//! There is no leave operation. Subscriptions live as long as the connection
//! and are dropped all at once when it closes.
use crate::hub::ConnectionId;
use chatter_common::{room_id, RoomId};
use dashmap::DashMap;
use std::collections::HashSet;

#[derive(Default)]
pub struct RoomRouter {
    members: DashMap<RoomId, HashSet<ConnectionId>>,
    joined: DashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to the room of `(a, b)`. Joining twice is a no-op.
    pub fn join(&self, connection: ConnectionId, a: &str, b: &str) -> RoomId {
        let room = room_id(a, b);
        self.members
            .entry(room.clone())
            .or_default()
            .insert(connection);
        self.joined
            .entry(connection)
            .or_default()
            .insert(room.clone());
        room
    }

    /// Connections subscribed to `room`
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.members
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_member(&self, connection: &ConnectionId, room: &RoomId) -> bool {
        self.members
            .get(room)
            .is_some_and(|set| set.contains(connection))
    }

    pub fn rooms_of(&self, connection: &ConnectionId) -> Vec<RoomId> {
        self.joined
            .get(connection)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every subscription of a closed connection. Returns how many rooms
    /// it had joined.
    pub fn drop_connection(&self, connection: &ConnectionId) -> usize {
        let Some((_, rooms)) = self.joined.remove(connection) else {
            return 0;
        };
        for room in &rooms {
            if let Some(mut set) = self.members.get_mut(room) {
                set.remove(connection);
            }
            self.members.remove_if(room, |_, set| set.is_empty());
        }
        rooms.len()
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.members.len()
    }
}
