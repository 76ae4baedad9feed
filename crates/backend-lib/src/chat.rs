// ============================
// crates/backend-lib/src/chat.rs
// ============================
//! Chat hub: process-wide owner of connections, presence, rooms and the
//! message store.
//!
//! A message is broadcast to its room only after the store accepted it, so a
//! receiver never sees a message that failed to persist. Presence and message
//! persistence are independent operations.
use crate::error::AppError;
use crate::hub::{ConnectionHub, ConnectionId};
use crate::metrics::{
    MESSAGE_FANOUT, MESSAGE_PERSISTED, MESSAGE_PERSIST_FAILED, MESSAGE_REJECTED, WS_ACTIVE,
    WS_CONNECTION, WS_DISCONNECTION,
};
use crate::presence::PresenceRegistry;
use crate::rooms::RoomRouter;
use crate::storage::MessageStore;
use crate::validation;
use chatter_common::{Message, ReceivedMessage, RoomId, RoomRequest, SendMessage, ServerEvent};
use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct ChatHub {
    connections: Arc<ConnectionHub>,
    presence: PresenceRegistry,
    rooms: RoomRouter,
    store: Arc<dyn MessageStore>,
}

impl ChatHub {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        let connections = Arc::new(ConnectionHub::new());
        Self {
            presence: PresenceRegistry::new(connections.clone()),
            connections,
            rooms: RoomRouter::new(),
            store,
        }
    }

    /// Register a freshly upgraded connection
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (id, rx) = self.connections.register();
        counter!(WS_CONNECTION).increment(1);
        gauge!(WS_ACTIVE).increment(1.0);
        debug!("Connection {id} registered");
        (id, rx)
    }

    /// `user_online`
    pub fn user_online(&self, connection: ConnectionId, username: &str) -> Result<(), AppError> {
        validation::validate_username(username)?;
        self.presence.mark_online(username, connection);
        Ok(())
    }

    /// `user_offline`. Returns false when the connection is not the one on
    /// record for `username`.
    pub fn user_offline(&self, connection: ConnectionId, username: &str) -> Result<bool, AppError> {
        validation::validate_username(username)?;
        Ok(self.presence.mark_offline(username, connection))
    }

    /// `join_room`
    pub fn join_room(&self, connection: ConnectionId, request: &RoomRequest) -> Result<RoomId, AppError> {
        validation::validate_room_request(request)?;
        let room = self
            .rooms
            .join(connection, &request.sender, &request.receiver);
        debug!("Connection {connection} joined room {room}");
        Ok(room)
    }

    /// `send_message`: validate, persist, then fan out to the pair's room.
    pub async fn send_message(&self, payload: SendMessage) -> Result<Message, AppError> {
        let client_id = payload.client_id.clone();
        let new_message = validation::validate_send(payload).inspect_err(|e| {
            counter!(MESSAGE_REJECTED).increment(1);
            warn!("Rejected send_message: {e}");
        })?;

        let stored = self.persist(new_message).await?;

        let room = stored.room();
        let event = ServerEvent::ReceiveMessage(ReceivedMessage::from_message(&stored, client_id));
        let mut delivered = 0;
        for member in self.rooms.members(&room) {
            match self.connections.send_to(&member, event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipping room member {member}: {e}"),
            }
        }
        counter!(MESSAGE_FANOUT).increment(delivered);
        debug!("Message {} delivered to {delivered} connections in room {room}", stored.id);
        Ok(stored)
    }

    /// `POST /messages`: persist without socket fan-out
    pub async fn post_message(&self, payload: SendMessage) -> Result<Message, AppError> {
        let new_message = validation::validate_post(payload, Utc::now()).inspect_err(|_| {
            counter!(MESSAGE_REJECTED).increment(1);
        })?;
        self.persist(new_message).await
    }

    pub async fn history(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError> {
        self.store.history(a, b).await
    }

    /// Transport disconnect: drop the connection, its rooms and any presence
    /// entry still pointing at it.
    pub fn disconnect(&self, connection: ConnectionId) {
        self.connections.unregister(&connection);
        let rooms = self.rooms.drop_connection(&connection);
        let users = self.presence.disconnect(connection);
        counter!(WS_DISCONNECTION).increment(1);
        gauge!(WS_ACTIVE).decrement(1.0);
        info!(
            "Connection {connection} closed ({rooms} rooms, users offline: {:?})",
            users
        );
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomRouter {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionHub {
        &self.connections
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    async fn persist(&self, message: crate::storage::NewMessage) -> Result<Message, AppError> {
        match self.store.append(message).await {
            Ok(stored) => {
                counter!(MESSAGE_PERSISTED).increment(1);
                Ok(stored)
            },
            Err(e) => {
                counter!(MESSAGE_PERSIST_FAILED).increment(1);
                error!("Error saving message: {e}");
                Err(e)
            },
        }
    }
}
