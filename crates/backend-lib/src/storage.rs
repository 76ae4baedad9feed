// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Message store abstraction with flat-file and in-memory implementations.
use crate::error::AppError;
use crate::validation;
use async_trait::async_trait;
use chatter_common::{Message, Username};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::Mutex};
use uuid::Uuid;

/// A validated message that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Username,
    pub receiver: Username,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Trait for message store backends
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message and return the stored record
    async fn append(&self, message: NewMessage) -> Result<Message, AppError>;

    /// All messages exchanged between `a` and `b`, oldest first
    async fn history(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError>;

    /// Number of stored messages
    async fn len(&self) -> Result<usize, AppError>;
}

/// Append-only log contents shared by both backends
#[derive(Default)]
struct MessageLog {
    messages: Vec<Message>,
    next_seq: u64,
}

impl MessageLog {
    fn stamp(&self, message: NewMessage) -> Message {
        Message {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            sender: message.sender,
            receiver: message.receiver,
            body: message.body,
            timestamp: message.timestamp,
            read: false,
            created_at: Utc::now(),
        }
    }

    fn push(&mut self, message: Message) {
        self.next_seq = self.next_seq.max(message.seq + 1);
        self.messages.push(message);
    }

    /// Timestamp ascending, insertion order for equal timestamps
    fn history(&self, a: &str, b: &str) -> Vec<Message> {
        let mut history: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        history.sort_by(|x, y| x.timestamp.cmp(&y.timestamp).then(x.seq.cmp(&y.seq)));
        history
    }
}

/// In-memory store, used for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStorage {
    log: parking_lot::Mutex<MessageLog>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStorage {
    async fn append(&self, message: NewMessage) -> Result<Message, AppError> {
        validation::validate_new_message(&message)?;
        let mut log = self.log.lock();
        let stored = log.stamp(message);
        log.push(stored.clone());
        Ok(stored)
    }

    async fn history(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError> {
        Ok(self.log.lock().history(a, b))
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.log.lock().messages.len())
    }
}

/// Flat-file implementation: one JSON line per message in
/// `<root>/messages/messages.log`, index rebuilt on open
pub struct FlatFileStorage {
    path: PathBuf,
    inner: Mutex<FlatFileInner>,
}

struct FlatFileInner {
    file: tokio_fs::File,
    /// Length of the log up to the last acknowledged record
    committed: u64,
    log: MessageLog,
}

impl FlatFileInner {
    async fn write_record(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }

    /// Cut the log back to `len` bytes
    async fn rollback(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len).await?;
        self.file.sync_data().await
    }
}

impl FlatFileStorage {
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let dir = root.as_ref().join("messages");
        tokio_fs::create_dir_all(&dir)
            .await
            .map_err(AppError::persistence)?;
        let path = dir.join("messages.log");

        let mut log = MessageLog::default();
        let mut torn_tail = false;
        if tokio_fs::try_exists(&path)
            .await
            .map_err(AppError::persistence)?
        {
            let content = tokio_fs::read_to_string(&path)
                .await
                .map_err(AppError::persistence)?;
            torn_tail = !content.is_empty() && !content.ends_with('\n');
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Message>(line) {
                    Ok(message) => log.push(message),
                    Err(e) => tracing::warn!(
                        "Skipping unreadable line {} in {}: {}",
                        line_no + 1,
                        path.display(),
                        e
                    ),
                }
            }
        }

        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(AppError::persistence)?;
        // Start the next record on a fresh line after an interrupted write
        if torn_tail {
            file.write_all(b"\n").await.map_err(AppError::persistence)?;
            file.sync_data().await.map_err(AppError::persistence)?;
        }
        let committed = file.metadata().await.map_err(AppError::persistence)?.len();

        tracing::info!(
            "Opened message log {} with {} messages",
            path.display(),
            log.messages.len()
        );

        Ok(Self {
            path,
            inner: Mutex::new(FlatFileInner {
                file,
                committed,
                log,
            }),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageStore for FlatFileStorage {
    async fn append(&self, message: NewMessage) -> Result<Message, AppError> {
        validation::validate_new_message(&message)?;

        let mut inner = self.inner.lock().await;
        let stored = inner.log.stamp(message);

        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        let committed = inner.committed;
        let on_disk = inner.file.metadata().await.map_err(AppError::persistence)?.len();
        if on_disk > committed {
            tracing::warn!(
                "Dropping {} uncommitted bytes at the end of {}",
                on_disk - committed,
                self.path.display()
            );
            inner.rollback(committed).await.map_err(AppError::persistence)?;
        }

        if let Err(e) = inner.write_record(line.as_bytes()).await {
            // Neither torn bytes nor an unacknowledged record may survive
            if let Err(rollback_err) = inner.rollback(committed).await {
                tracing::error!(
                    "Could not roll back {} to {} bytes: {}",
                    self.path.display(),
                    committed,
                    rollback_err
                );
            }
            return Err(AppError::persistence(e));
        }

        inner.committed = committed + line.len() as u64;
        inner.log.push(stored.clone());
        Ok(stored)
    }

    async fn history(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError> {
        Ok(self.inner.lock().await.log.history(a, b))
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.inner.lock().await.log.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn new_message(sender: &str, receiver: &str, body: &str, timestamp: DateTime<Utc>) -> NewMessage {
        NewMessage {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_history_keeps_append_order() {
        let store = MemoryStorage::new();
        let t0 = Utc::now();
        let m1 = store.append(new_message("alice", "bob", "m1", t0)).await.unwrap();
        let m2 = store
            .append(new_message("bob", "alice", "m2", t0 + Duration::seconds(1)))
            .await
            .unwrap();

        let history = store.history("alice", "bob").await.unwrap();
        assert_eq!(history, vec![m1.clone(), m2.clone()]);
        assert_eq!(store.history("bob", "alice").await.unwrap(), vec![m1, m2]);
    }

    #[tokio::test]
    async fn test_history_orders_by_timestamp_then_insertion() {
        let store = MemoryStorage::new();
        let t0 = Utc::now();
        let late = store
            .append(new_message("alice", "bob", "late", t0 + Duration::seconds(5)))
            .await
            .unwrap();
        let tie_a = store.append(new_message("alice", "bob", "tie-a", t0)).await.unwrap();
        let tie_b = store.append(new_message("bob", "alice", "tie-b", t0)).await.unwrap();

        let bodies: Vec<String> = store
            .history("alice", "bob")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["tie-a", "tie-b", "late"]);
        assert!(late.seq < tie_a.seq && tie_a.seq < tie_b.seq);
    }

    #[tokio::test]
    async fn test_history_only_includes_the_pair() {
        let store = MemoryStorage::new();
        let now = Utc::now();
        store.append(new_message("alice", "bob", "1", now)).await.unwrap();
        store.append(new_message("alice", "carol", "2", now)).await.unwrap();
        store.append(new_message("carol", "bob", "3", now)).await.unwrap();

        let history = store.history("alice", "bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "1");
        assert!(!history[0].read);
    }

    #[tokio::test]
    async fn test_append_rejects_invalid_message() {
        let store = MemoryStorage::new();
        let err = store
            .append(new_message("alice", "bob", "   ", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = MemoryStorage::new();
        let now = Utc::now();
        let a = store.append(new_message("alice", "bob", "x", now)).await.unwrap();
        let b = store.append(new_message("alice", "bob", "x", now)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.seq, a.seq + 1);
    }

    #[tokio::test]
    async fn test_flat_file_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let now = Utc::now();
        let first = {
            let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
            store.append(new_message("alice", "bob", "hello", now)).await.unwrap()
        };

        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.history("bob", "alice").await.unwrap(), vec![first.clone()]);

        // Sequence numbers continue after the reloaded log
        let second = store
            .append(new_message("bob", "alice", "again", now))
            .await
            .unwrap();
        assert_eq!(second.seq, first.seq + 1);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_flat_file_skips_torn_lines() {
        let temp_dir = TempDir::new().unwrap();
        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        store
            .append(new_message("alice", "bob", "kept", Utc::now()))
            .await
            .unwrap();
        let path = store.log_path().to_path_buf();
        drop(store);

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":\"trunc");
        std::fs::write(&path, content).unwrap();

        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        store
            .append(new_message("bob", "alice", "after", Utc::now()))
            .await
            .unwrap();
        drop(store);
        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_after_interrupted_write_survives_reopen() {
        use std::io::Write;

        let temp_dir = TempDir::new().unwrap();
        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        store
            .append(new_message("alice", "bob", "first", Utc::now()))
            .await
            .unwrap();

        // Leftover of a write that never completed, while the store is open
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.log_path())
            .unwrap();
        file.write_all(b"{\"id\":\"partial").unwrap();
        drop(file);

        store
            .append(new_message("bob", "alice", "acknowledged", Utc::now()))
            .await
            .unwrap();
        drop(store);

        let store = FlatFileStorage::open(temp_dir.path()).await.unwrap();
        let bodies: Vec<String> = store
            .history("alice", "bob")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["first", "acknowledged"]);

        let content = std::fs::read_to_string(store.log_path()).unwrap();
        assert!(!content.contains("partial"));
        assert!(content.ends_with('\n'));
    }
}
