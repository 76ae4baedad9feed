// ============================
// crates/backend-lib/src/hub.rs
// ============================
//! Registry of every live socket connection and its outbound queue.
use crate::error::AppError;
use chatter_common::ServerEvent;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle that identifies one socket connection
pub type ConnectionId = Uuid;

/// Outbound queue of a connection; drained by its socket writer task
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// All connected clients, announced or not
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, Outbound>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id and the receiving end of its
    /// outbound queue
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.insert(id, tx);
        (id, rx)
    }

    /// Remove a connection. Dropping its sender ends the writer task.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Queue an event for one connection
    pub fn send_to(&self, id: &ConnectionId, event: ServerEvent) -> Result<(), AppError> {
        let tx = self
            .connections
            .get(id)
            .ok_or_else(|| AppError::Transport(format!("Connection {id} is not registered")))?;
        tx.send(event)?;
        Ok(())
    }

    /// Queue an event for every connection. Returns how many accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for entry in self.connections.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!("Skipping closed connection {}", entry.key());
            }
        }
        delivered
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
