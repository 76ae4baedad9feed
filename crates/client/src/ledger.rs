// ============================
// crates/client/src/ledger.rs
// ============================
//! Unread ledger: per-peer unread counters kept on the client.
//!
//! The whole map is written back after every mutation, before the caller can
//! observe the new value. Counters live under the single key [`LEDGER_KEY`].
use crate::error::ClientResult;
use chatter_common::Username;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Durable key holding the counters
pub const LEDGER_KEY: &str = "unreadMessages";

pub type UnreadCounts = BTreeMap<Username, u32>;

/// Durable backing of an [`UnreadLedger`]
pub trait LedgerStorage: Send {
    fn load(&self) -> ClientResult<UnreadCounts>;
    fn save(&self, counts: &UnreadCounts) -> ClientResult<()>;
}

/// JSON file storage. Other top-level keys in the file are preserved.
pub struct FileLedgerStorage {
    path: PathBuf,
}

impl FileLedgerStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> ClientResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl LedgerStorage for FileLedgerStorage {
    fn load(&self) -> ClientResult<UnreadCounts> {
        let mut document = self.read_document()?;
        match document.remove(LEDGER_KEY) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(UnreadCounts::new()),
        }
    }

    fn save(&self, counts: &UnreadCounts) -> ClientResult<()> {
        let mut document = self.read_document()?;
        document.insert(LEDGER_KEY.to_string(), serde_json::to_value(counts)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Sibling file first, then rename over the ledger
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&Value::Object(document))?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved unread ledger to {}", self.path.display());
        Ok(())
    }
}

/// In-memory storage. Clones share the same backing map.
#[derive(Clone, Default)]
pub struct MemoryLedgerStorage {
    counts: Arc<Mutex<UnreadCounts>>,
}

impl MemoryLedgerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// What has been persisted so far
    pub fn persisted(&self) -> UnreadCounts {
        self.counts.lock().clone()
    }
}

impl LedgerStorage for MemoryLedgerStorage {
    fn load(&self) -> ClientResult<UnreadCounts> {
        Ok(self.counts.lock().clone())
    }

    fn save(&self, counts: &UnreadCounts) -> ClientResult<()> {
        *self.counts.lock() = counts.clone();
        Ok(())
    }
}

pub struct UnreadLedger<L: LedgerStorage> {
    storage: L,
    counts: UnreadCounts,
}

impl<L: LedgerStorage> UnreadLedger<L> {
    /// Empty ledger; call [`UnreadLedger::load`] before rendering contacts
    pub fn new(storage: L) -> Self {
        Self {
            storage,
            counts: UnreadCounts::new(),
        }
    }

    /// Replace the in-memory counters with the durable copy
    pub fn load(&mut self) -> ClientResult<()> {
        self.counts = self.storage.load()?;
        Ok(())
    }

    /// A message from `peer` arrived while `focused` was the open
    /// conversation. Returns whether the counter moved.
    pub fn on_message_received(&mut self, peer: &str, focused: Option<&str>) -> ClientResult<bool> {
        if focused == Some(peer) {
            return Ok(false);
        }
        let next = self.count(peer).saturating_add(1);
        self.commit(peer, next)?;
        Ok(true)
    }

    /// Reset `peer` to zero and persist
    pub fn on_conversation_opened(&mut self, peer: &str) -> ClientResult<()> {
        self.commit(peer, 0)
    }

    /// Persist the updated map; memory only changes once the save succeeded
    fn commit(&mut self, peer: &str, value: u32) -> ClientResult<()> {
        let mut updated = self.counts.clone();
        updated.insert(peer.to_string(), value);
        self.storage.save(&updated)?;
        self.counts = updated;
        Ok(())
    }

    pub fn count(&self, peer: &str) -> u32 {
        self.counts.get(peer).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> UnreadCounts {
        self.counts.clone()
    }

    pub fn storage(&self) -> &L {
        &self.storage
    }
}
