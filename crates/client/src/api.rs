// ============================
// crates/client/src/api.rs
// ============================
//! HTTP side of the chat API.
use crate::error::ClientResult;
use async_trait::async_trait;
use chatter_common::{Message, UserSummary};
use reqwest::Client;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /users`
    async fn list_users(&self) -> ClientResult<Vec<UserSummary>>;

    /// `GET /messages?user1=&user2=`
    async fn history(&self, user1: &str, user2: &str) -> ClientResult<Vec<Message>>;
}

/// reqwest client for a chatter server
pub struct HttpChatApi {
    base_url: String,
    client: Client,
}

impl HttpChatApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_users(&self) -> ClientResult<Vec<UserSummary>> {
        let users = self
            .client
            .get(self.url("/users"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(users)
    }

    async fn history(&self, user1: &str, user2: &str) -> ClientResult<Vec<Message>> {
        let messages = self
            .client
            .get(self.url("/messages"))
            .query(&[("user1", user1), ("user2", user2)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }
}
