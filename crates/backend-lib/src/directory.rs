// ============================
// crates/backend-lib/src/directory.rs
// ============================
//! User directory backing `GET /users`.
//!
//! Profiles are owned by the account subsystem; this layer only reads the
//! `{username, img}` pairs it publishes.
use crate::error::AppError;
use async_trait::async_trait;
use chatter_common::UserSummary;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError>;
}

/// Reads `<root>/users.json` on every call so profile edits show up without
/// a restart. A missing file is an empty directory.
pub struct FlatFileDirectory {
    path: PathBuf,
}

impl FlatFileDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            path: root.as_ref().join("users.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UserDirectory for FlatFileDirectory {
    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        if !tokio_fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio_fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: Vec<UserSummary>,
}

impl MemoryDirectory {
    pub fn new(users: Vec<UserSummary>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        Ok(self.users.clone())
    }
}
