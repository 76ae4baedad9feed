// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core functionality of the chatter presence and messaging server.

pub mod chat;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod metrics;
pub mod presence;
pub mod rooms;
pub mod storage;
pub mod validation;
pub mod websocket;
pub mod ws_router;

use crate::chat::ChatHub;
use crate::config::{Settings, StorageBackend};
use crate::directory::{FlatFileDirectory, MemoryDirectory, UserDirectory};
use crate::error::AppError;
use crate::storage::{FlatFileStorage, MemoryStorage, MessageStore};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Connections, presence, rooms and the message store
    pub hub: Arc<ChatHub>,
    /// Source of the contact list
    pub users: Arc<dyn UserDirectory>,
    /// Settings the server was started with
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn MessageStore>, users: Arc<dyn UserDirectory>, settings: Settings) -> Self {
        Self {
            hub: Arc::new(ChatHub::new(store)),
            users,
            settings: Arc::new(settings),
        }
    }

    /// Build the backends selected by `settings`
    pub async fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let store: Arc<dyn MessageStore>;
        let users: Arc<dyn UserDirectory>;
        match settings.storage.backend {
            StorageBackend::File => {
                store = Arc::new(FlatFileStorage::open(&settings.storage.path).await?);
                users = Arc::new(FlatFileDirectory::new(&settings.storage.path));
            },
            StorageBackend::Memory => {
                store = Arc::new(MemoryStorage::new());
                users = Arc::new(MemoryDirectory::default());
            },
        }
        tracing::info!("Using {:?} storage backend", settings.storage.backend);
        Ok(Self::new(store, users, settings))
    }

    /// Everything in memory with default settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryDirectory::default()),
            Settings::default(),
        )
    }
}
