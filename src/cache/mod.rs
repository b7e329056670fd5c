//! Session cache.
//!
//! Conversations, re-encrypted passwords and conversion rates are kept here
//! between webhook deliveries, each with its own TTL.

mod memory;
mod redis;

pub use memory::*;
pub use self::redis::*;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifetime of a live conversation.
pub const CONVERSATION_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime of a re-encrypted password after a successful prompt.
pub const PASSWORD_TTL: Duration = Duration::from_secs(180);
/// Lifetime of an exchange rate.
pub const CONVERSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Key → value store with expiration. Last writer wins.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

impl dyn Cache {
    /// Read and decode a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.set(key, serde_json::to_string(value)?, ttl).await
    }
}

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedConversion {
    pub from: String,
    pub to: String,
    pub rate: f64,
}

pub fn conversation_key(user_id: i64) -> String {
    format!("{user_id}_conversation")
}

pub fn password_key(user_id: i64) -> String {
    format!("{user_id}_password")
}

pub fn conversion_key(from: &str, to: &str) -> String {
    format!("{from}_{to}")
}
