// ============================
// crates/client/src/session.rs
// ============================
//! Chat session controller.
//!
//! A `ChatSession` holds everything one signed-in user sees: who is online,
//! the contact list, the open conversation and the unread ledger. It is driven
//! by user actions (`open_chat`, `send`, ...) and by server events fed through
//! [`ChatSession::handle_event`].
//!
//! Sent messages are not added to the open conversation directly. They show
//! up when the server echoes them back through the room, so local history
//! only ever holds persisted messages.
use crate::api::ChatApi;
use crate::error::{ClientError, ClientResult};
use crate::ledger::{LedgerStorage, UnreadCounts, UnreadLedger};
use crate::transport::Transport;
use chatter_common::{
    ClientEvent, Message, ReceivedMessage, RoomRequest, SendMessage, ServerEvent, UserSummary,
    Username,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seconds a send may wait for its echo before it is dropped
pub const PENDING_TTL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Presence announced; `rooms_joined` once every contact's room is joined
    Connected { rooms_joined: bool },
    ChatOpen { peer: Username },
}

/// One line of the open conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub id: Option<Uuid>,
    pub sender: Username,
    pub receiver: Username,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for ChatLine {
    fn from(message: Message) -> Self {
        Self {
            id: Some(message.id),
            sender: message.sender,
            receiver: message.receiver,
            body: message.body,
            timestamp: message.timestamp,
        }
    }
}

impl From<ReceivedMessage> for ChatLine {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            id: message.id,
            sender: message.sender,
            receiver: message.receiver,
            body: message.message,
            timestamp: message.timestamp,
        }
    }
}

/// A send waiting for its room echo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub receiver: Username,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ChatSession<T: Transport, A: ChatApi, L: LedgerStorage> {
    username: Username,
    api: A,
    ledger: UnreadLedger<L>,
    transport: Option<T>,
    rooms_joined: bool,
    open_peer: Option<Username>,
    online: BTreeSet<Username>,
    contacts: Vec<UserSummary>,
    contacts_loaded: bool,
    history: Vec<ChatLine>,
    pending: HashMap<String, PendingSend>,
    scroll_requested: bool,
}

impl<T: Transport, A: ChatApi, L: LedgerStorage> ChatSession<T, A, L> {
    /// New disconnected session. The durable ledger is loaded here, before any
    /// contact can be rendered.
    pub fn new(username: impl Into<Username>, api: A, ledger_storage: L) -> ClientResult<Self> {
        let mut ledger = UnreadLedger::new(ledger_storage);
        ledger.load()?;
        Ok(Self {
            username: username.into(),
            api,
            ledger,
            transport: None,
            rooms_joined: false,
            open_peer: None,
            online: BTreeSet::new(),
            contacts: Vec::new(),
            contacts_loaded: false,
            history: Vec::new(),
            pending: HashMap::new(),
            scroll_requested: false,
        })
    }

    /// Take over `transport` and announce presence. Rooms are joined as soon
    /// as contacts are known.
    pub fn connect(&mut self, transport: T) -> ClientResult<()> {
        transport.send(ClientEvent::UserOnline(self.username.clone()))?;
        self.transport = Some(transport);
        self.rooms_joined = false;
        self.pending.clear();
        info!("{} connected", self.username);
        self.join_rooms();
        Ok(())
    }

    /// Fetch the contact list. On failure the previous list is kept.
    pub async fn load_contacts(&mut self) -> ClientResult<()> {
        let users = match self.api.list_users().await {
            Ok(users) => users,
            Err(e) => {
                warn!("Failed to fetch contacts: {e}");
                return Err(e);
            },
        };
        self.contacts = users
            .into_iter()
            .filter(|u| u.username != self.username)
            .collect();
        self.contacts_loaded = true;
        self.join_rooms();
        Ok(())
    }

    /// Focus the conversation with `peer`: reset its unread count, then load
    /// its history.
    pub async fn open_chat(&mut self, peer: &str) -> ClientResult<()> {
        if self.transport.is_none() {
            return Err(ClientError::NotConnected);
        }
        self.ledger.on_conversation_opened(peer)?;
        if self.open_peer.as_deref() != Some(peer) {
            self.history.clear();
        }
        self.open_peer = Some(peer.to_string());
        self.scroll_requested = true;

        match self.api.history(&self.username, peer).await {
            Ok(messages) => {
                self.history = messages.into_iter().map(ChatLine::from).collect();
                self.scroll_requested = true;
                Ok(())
            },
            Err(e) => {
                warn!("Failed to fetch history with {peer}: {e}");
                Err(e)
            },
        }
    }

    pub fn close_chat(&mut self) {
        self.open_peer = None;
        self.history.clear();
    }

    /// Send `text` to the open conversation. Whitespace-only text is a no-op
    /// and returns `None`; otherwise returns the correlation id of the pending
    /// send. Nothing is queued when the connection is gone.
    pub fn send(&mut self, text: &str) -> ClientResult<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let receiver = self.open_peer.clone().ok_or(ClientError::NoConversation)?;
        let timestamp = Utc::now();
        self.expire_pending(timestamp);
        let transport = self.transport.as_ref().ok_or(ClientError::NotConnected)?;

        let client_id = Uuid::new_v4().to_string();
        transport
            .send(ClientEvent::SendMessage(SendMessage {
                sender: Some(self.username.clone()),
                receiver: Some(receiver.clone()),
                message: Some(text.to_string()),
                timestamp: Some(timestamp),
                client_id: Some(client_id.clone()),
            }))
            .inspect_err(|e| warn!("Dropping send to {receiver}: {e}"))?;

        self.pending.insert(
            client_id.clone(),
            PendingSend {
                receiver,
                body: text.to_string(),
                timestamp,
            },
        );
        Ok(Some(client_id))
    }

    /// Apply one server event
    pub fn handle_event(&mut self, event: ServerEvent) -> ClientResult<()> {
        self.expire_pending(Utc::now());
        match event {
            ServerEvent::UserOnline(users) => {
                self.online = users.into_iter().collect();
            },
            ServerEvent::UserOffline(username) => {
                self.online.remove(&username);
            },
            ServerEvent::ReceiveMessage(message) => return self.receive(message),
        }
        Ok(())
    }

    /// Announce the intentional teardown and drop the connection
    pub fn disconnect(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.send(ClientEvent::UserOffline(self.username.clone())) {
                debug!("Offline announcement not sent: {e}");
            }
            transport.close();
        }
        self.rooms_joined = false;
        self.open_peer = None;
        self.history.clear();
        self.online.clear();
        self.pending.clear();
        info!("{} disconnected", self.username);
    }

    pub fn state(&self) -> SessionState {
        match (&self.transport, &self.open_peer) {
            (None, _) => SessionState::Disconnected,
            (Some(_), Some(peer)) => SessionState::ChatOpen { peer: peer.clone() },
            (Some(_), None) => SessionState::Connected {
                rooms_joined: self.rooms_joined,
            },
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn online_users(&self) -> Vec<Username> {
        self.online.iter().cloned().collect()
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.online.contains(username)
    }

    pub fn contacts(&self) -> &[UserSummary] {
        &self.contacts
    }

    pub fn history(&self) -> &[ChatLine] {
        &self.history
    }

    pub fn unread(&self, peer: &str) -> u32 {
        self.ledger.count(peer)
    }

    pub fn unread_counts(&self) -> UnreadCounts {
        self.ledger.snapshot()
    }

    pub fn pending(&self) -> &HashMap<String, PendingSend> {
        &self.pending
    }

    pub fn ledger(&self) -> &UnreadLedger<L> {
        &self.ledger
    }

    /// True once after any history change or chat opening
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    fn join_rooms(&mut self) {
        if self.rooms_joined || !self.contacts_loaded {
            return;
        }
        let Some(transport) = &self.transport else {
            return;
        };
        for contact in &self.contacts {
            let request = RoomRequest {
                sender: self.username.clone(),
                receiver: contact.username.clone(),
            };
            if let Err(e) = transport.send(ClientEvent::JoinRoom(request)) {
                warn!("Failed to join room with {}: {e}", contact.username);
                return;
            }
        }
        self.rooms_joined = true;
        debug!("{} joined {} rooms", self.username, self.contacts.len());
    }

    /// Drop sends whose echo is overdue; a rejected send never echoes
    fn expire_pending(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(PENDING_TTL_SECS);
        let before = self.pending.len();
        self.pending.retain(|_, send| send.timestamp >= cutoff);
        let expired = before - self.pending.len();
        if expired > 0 {
            warn!("{expired} sends expired without an echo");
        }
    }

    fn receive(&mut self, message: ReceivedMessage) -> ClientResult<()> {
        let own = message.sender == self.username;
        if own {
            if let Some(client_id) = &message.client_id {
                self.pending.remove(client_id);
            }
        }
        let peer = if own {
            message.receiver.clone()
        } else {
            message.sender.clone()
        };

        if self.open_peer.as_deref() == Some(peer.as_str()) {
            self.append(message.into());
        }
        if !own {
            self.ledger
                .on_message_received(&peer, self.open_peer.as_deref())?;
        }
        Ok(())
    }

    fn append(&mut self, line: ChatLine) {
        // History fetched after the broadcast may already hold this message
        if line.id.is_some() && self.history.iter().any(|l| l.id == line.id) {
            return;
        }
        self.history.push(line);
        self.scroll_requested = true;
    }
}
