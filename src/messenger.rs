//! Capability interface over the messaging backend.
//!
//! The session only talks to the backend through [`Messenger`], which keeps
//! the interactive loop and inbound relay testable against a scripted fake.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::credentials::AppState;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("api error: {error} ({description})")]
    Api { error: String, description: String },
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("listener error: {0}")]
    Listener(String),
}

/// One item from the event subscription.
pub type Delivery = Result<Event, MessengerError>;

pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
    #[serde(rename = "senderID", default)]
    pub sender_id: String,
    #[serde(rename = "threadID", default)]
    pub thread_id: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl Event {
    pub fn is_group_message(&self) -> bool {
        self.is_group && self.kind == MESSAGE_EVENT
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadSummary {
    #[serde(rename = "threadID")]
    pub thread_id: String,
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Exchange a stored app state for a connected client.
    async fn login(config: &Config, credentials: &AppState) -> Result<Self, MessengerError>
    where
        Self: Sized;

    async fn send_message(&self, text: &str, thread_id: &str) -> Result<(), MessengerError>;

    async fn get_thread_info(&self, thread_id: &str) -> Result<ThreadInfo, MessengerError>;

    /// Keyed by user id, like the backend returns it.
    async fn get_user_info(&self, user_id: &str) -> Result<HashMap<String, UserInfo>, MessengerError>;

    async fn get_thread_list(&self, limit: usize) -> Result<Vec<ThreadSummary>, MessengerError>;

    /// Start perpetual event delivery. The receiver yields until the backend
    /// closes the stream.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Delivery>, MessengerError>;
}
