// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! WebSocket Handler Module
//!
//! One `WebSocketHandler` exists per upgraded connection. It decodes inbound
//! frames into `ClientEvent`s and dispatches them to the shared `ChatHub`.
//!
//! Protocol errors are never sent back to the client. Malformed frames and
//! rejected events are logged and dropped so the connection stays usable.

use crate::chat::ChatHub;
use crate::error::AppError;
use crate::hub::ConnectionId;
use crate::metrics::WS_FRAME_MALFORMED;
use chatter_common::ClientEvent;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// WebSocket handler for processing client events
pub struct WebSocketHandler {
    hub: Arc<ChatHub>,
    connection_id: ConnectionId,
}

impl WebSocketHandler {
    pub fn new(hub: Arc<ChatHub>, connection_id: ConnectionId) -> Self {
        Self { hub, connection_id }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Handle one text frame. Never fails; problems are logged.
    pub async fn handle_text(&self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                counter!(WS_FRAME_MALFORMED).increment(1);
                warn!(
                    "Ignoring malformed frame from connection {}: {e}",
                    self.connection_id
                );
                return;
            },
        };

        if let Err(e) = self.handle_event(event).await {
            match e {
                AppError::Validation(_) | AppError::InvalidInput(_) => warn!(
                    "Rejected event from connection {}: {e}",
                    self.connection_id
                ),
                other => error!(
                    "Failed to handle event from connection {}: {other}",
                    self.connection_id
                ),
            }
        }
    }

    /// Dispatch a decoded event to the hub
    pub async fn handle_event(&self, event: ClientEvent) -> Result<(), AppError> {
        match event {
            ClientEvent::UserOnline(username) => {
                self.hub.user_online(self.connection_id, &username)?;
                debug!("{username} is online via {}", self.connection_id);
            },
            ClientEvent::UserOffline(username) => {
                if !self.hub.user_offline(self.connection_id, &username)? {
                    debug!(
                        "Ignoring user_offline for {username}: not held by {}",
                        self.connection_id
                    );
                }
            },
            ClientEvent::JoinRoom(request) => {
                self.hub.join_room(self.connection_id, &request)?;
            },
            ClientEvent::SendMessage(payload) => {
                self.hub.send_message(payload).await?;
            },
        }
        Ok(())
    }
}
