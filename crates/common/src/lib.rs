// ================
// common/src/lib.rs
// ================
//! Common types shared by the chatter server and its clients.
//!
//! This crate defines the socket event protocol, the persisted direct
//! [`Message`] entity and the derivation of a [`RoomId`] from a pair of
//! usernames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Usernames are the only identity used by presence, rooms and attribution.
pub type Username = String;

/// Separator used in the display form of a [`RoomId`].
pub const ROOM_SEPARATOR: char = '_';

/// Events sent from client to server.
///
/// Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce that `username` is online on this connection
    UserOnline(Username),
    /// Intentional teardown for `username`
    UserOffline(Username),
    /// Subscribe this connection to the room of the pair
    JoinRoom(RoomRequest),
    /// Persist a direct message and fan it out to the pair's room
    SendMessage(SendMessage),
}

/// Payload of `join_room`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub sender: Username,
    pub receiver: Username,
}

/// Payload of `send_message` and body of `POST /messages`.
///
/// Fields are optional on the wire so that incomplete requests reach
/// validation instead of failing to decode.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessage {
    pub sender: Option<Username>,
    pub receiver: Option<Username>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Client correlation id, echoed back on `receive_message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Events sent from server to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full set of online usernames, sorted
    UserOnline(Vec<Username>),
    /// A username that just went offline
    UserOffline(Username),
    /// A persisted message delivered to a room
    ReceiveMessage(ReceivedMessage),
}

/// Payload of `receive_message`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: Username,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Other participant; lets a sender attribute its own echo
    #[serde(default)]
    pub receiver: Username,
    /// Server-assigned message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ReceivedMessage {
    /// Build the broadcast payload for a stored message.
    pub fn from_message(message: &Message, client_id: Option<String>) -> Self {
        Self {
            sender: message.sender.clone(),
            message: message.body.clone(),
            timestamp: message.timestamp,
            receiver: message.receiver.clone(),
            id: Some(message.id),
            client_id,
        }
    }
}

/// A direct message as persisted by the message store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned unique id
    pub id: Uuid,
    /// Insertion order within the store
    pub seq: u64,
    pub sender: Username,
    pub receiver: Username,
    #[serde(rename = "message")]
    pub body: String,
    /// Send time supplied with the message
    pub timestamp: DateTime<Utc>,
    /// Not set by any flow yet
    #[serde(default)]
    pub read: bool,
    /// Server time of persistence
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True when `{sender, receiver}` equals `{a, b}`.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }

    pub fn room(&self) -> RoomId {
        RoomId::new(&self.sender, &self.receiver)
    }
}

/// Entry of the contact list served by `GET /users`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub username: Username,
    #[serde(default)]
    pub img: Option<String>,
}

/// Channel scoped to exactly one unordered pair of usernames.
///
/// The pair is stored sorted so that `RoomId::new(a, b) == RoomId::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    low: Username,
    high: Username,
}

impl RoomId {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    /// Participants in canonical order
    pub fn participants(&self) -> (&str, &str) {
        (&self.low, &self.high)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.low == username || self.high == username
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.low, ROOM_SEPARATOR, self.high)
    }
}

/// Room of the pair `(a, b)` regardless of argument order.
pub fn room_id(a: &str, b: &str) -> RoomId {
    RoomId::new(a, b)
}
