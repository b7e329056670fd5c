//! Messaging platform: inbound updates and outbound client.

mod client;

pub use client::*;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Show the typing indicator.
    async fn send_typing(&self, chat_id: i64) -> Result<()>;

    /// Upload a file to the chat.
    async fn send_document(&self, chat_id: i64, path: &Path) -> Result<()>;
}

/// Webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Inbound message. Only the fields the bot reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix timestamp.
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Sender>,
    pub chat: Chat,
}

impl Message {
    /// Identifier of the user who wrote the message.
    pub fn sender_id(&self) -> i64 {
        self.from.as_ref().map_or(self.chat.id, |from| from.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}
