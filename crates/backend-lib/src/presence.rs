// ============================
// crates/backend-lib/src/presence.rs
// ============================
//! Presence registry: which usernames currently hold a live connection.
//!
//! Each username maps to at most one connection (last connection wins).
//! Removals are guarded by connection identity so that a late disconnect from
//! a superseded connection never evicts the fresh one. Every mutation is
//! published to all connections while the registry lock is held, so the
//! online sets clients observe follow the order of mutations.
use crate::hub::{ConnectionHub, ConnectionId};
use crate::metrics::PRESENCE_BROADCAST;
use chatter_common::{ServerEvent, Username};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PresenceRegistry {
    online: Mutex<BTreeMap<Username, ConnectionId>>,
    hub: Arc<ConnectionHub>,
}

impl PresenceRegistry {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self {
            online: Mutex::new(BTreeMap::new()),
            hub,
        }
    }

    /// Record `username` as online on `connection` and publish the full online
    /// set. Returns the published set.
    pub fn mark_online(&self, username: &str, connection: ConnectionId) -> Vec<Username> {
        let mut online = self.online.lock();
        if let Some(previous) = online.insert(username.to_string(), connection) {
            if previous != connection {
                debug!("{username} moved from connection {previous} to {connection}");
            }
        }
        info!("{username} is online");

        let snapshot: Vec<Username> = online.keys().cloned().collect();
        self.publish(ServerEvent::UserOnline(snapshot.clone()));
        snapshot
    }

    /// Remove `username` if `connection` is the one on record, then publish the
    /// removal. A stale connection gets `false` and nothing is published.
    pub fn mark_offline(&self, username: &str, connection: ConnectionId) -> bool {
        let mut online = self.online.lock();
        match online.get(username) {
            Some(current) if *current == connection => {
                online.remove(username);
                info!("{username} is offline");
                self.publish(ServerEvent::UserOffline(username.to_string()));
                true
            },
            Some(current) => {
                debug!(
                    "Ignoring stale offline for {username}: connection {connection} superseded by {current}"
                );
                false
            },
            None => false,
        }
    }

    /// Transport-level disconnect: remove every username still mapped to
    /// `connection` and publish each removal.
    pub fn disconnect(&self, connection: ConnectionId) -> Vec<Username> {
        let mut online = self.online.lock();
        let removed: Vec<Username> = online
            .iter()
            .filter(|(_, id)| **id == connection)
            .map(|(name, _)| name.clone())
            .collect();

        for username in &removed {
            online.remove(username);
            info!("{username} disconnected");
            self.publish(ServerEvent::UserOffline(username.clone()));
        }
        removed
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.online.lock().contains_key(username)
    }

    /// Connection currently on record for `username`
    pub fn connection_of(&self, username: &str) -> Option<ConnectionId> {
        self.online.lock().get(username).copied()
    }

    /// Online usernames, sorted
    pub fn online_users(&self) -> Vec<Username> {
        self.online.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.online.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.lock().is_empty()
    }

    fn publish(&self, event: ServerEvent) {
        let delivered = self.hub.broadcast(&event);
        counter!(PRESENCE_BROADCAST).increment(1);
        debug!("Presence update delivered to {delivered} connections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup() -> (PresenceRegistry, Arc<ConnectionHub>) {
        let hub = Arc::new(ConnectionHub::new());
        (PresenceRegistry::new(hub.clone()), hub)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_mark_online_is_idempotent() {
        let (presence, hub) = setup();
        let (h1, mut rx) = hub.register();

        presence.mark_online("alice", h1);
        let snapshot = presence.mark_online("alice", h1);

        assert_eq!(presence.len(), 1);
        assert_eq!(snapshot, vec!["alice".to_string()]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events.last(),
            Some(&ServerEvent::UserOnline(vec!["alice".to_string()]))
        );
    }

    #[test]
    fn test_online_set_is_sorted_and_global() {
        let (presence, hub) = setup();
        let (h1, _rx1) = hub.register();
        let (h2, _rx2) = hub.register();
        // A connection that never announced still receives presence
        let (_observer, mut observer_rx) = hub.register();

        presence.mark_online("bob", h1);
        presence.mark_online("alice", h2);

        let events = drain(&mut observer_rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::UserOnline(vec!["bob".to_string()]),
                ServerEvent::UserOnline(vec!["alice".to_string(), "bob".to_string()]),
            ]
        );
    }

    #[test]
    fn test_stale_disconnect_keeps_fresh_connection() {
        let (presence, hub) = setup();
        let (h1, _rx1) = hub.register();
        let (h2, mut rx2) = hub.register();

        presence.mark_online("alice", h1);
        presence.mark_online("alice", h2);
        drain(&mut rx2);

        assert!(presence.disconnect(h1).is_empty());
        assert!(presence.is_online("alice"));
        assert_eq!(presence.connection_of("alice"), Some(h2));
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_stale_offline_is_ignored() {
        let (presence, hub) = setup();
        let (h1, _rx1) = hub.register();
        let (h2, _rx2) = hub.register();

        presence.mark_online("alice", h1);
        presence.mark_online("alice", h2);

        assert!(!presence.mark_offline("alice", h1));
        assert!(presence.is_online("alice"));

        assert!(presence.mark_offline("alice", h2));
        assert!(!presence.is_online("alice"));
    }

    #[test]
    fn test_disconnect_publishes_removed_username() {
        let (presence, hub) = setup();
        let (h1, _rx1) = hub.register();
        let (_h2, mut rx2) = hub.register();

        presence.mark_online("alice", h1);
        drain(&mut rx2);

        assert_eq!(presence.disconnect(h1), vec!["alice".to_string()]);
        assert_eq!(
            drain(&mut rx2),
            vec![ServerEvent::UserOffline("alice".to_string())]
        );
        assert!(presence.is_empty());
    }

    #[test]
    fn test_offline_for_unknown_user_publishes_nothing() {
        let (presence, hub) = setup();
        let (h1, mut rx) = hub.register();
        assert!(!presence.mark_offline("ghost", h1));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_registries_are_isolated() {
        let (first, hub_a) = setup();
        let (second, _hub_b) = setup();
        let (h1, _rx) = hub_a.register();

        first.mark_online("alice", h1);
        assert!(first.is_online("alice"));
        assert!(!second.is_online("alice"));
    }

    #[test]
    fn test_concurrent_connect_disconnect() {
        let (presence, hub) = setup();
        let presence = Arc::new(presence);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let presence = presence.clone();
                let hub = hub.clone();
                std::thread::spawn(move || {
                    let (id, _rx) = hub.register();
                    let name = format!("user{i}");
                    for _ in 0..50 {
                        presence.mark_online(&name, id);
                        presence.disconnect(id);
                    }
                    presence.mark_online(&name, id);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(presence.len(), 8);
    }
}
