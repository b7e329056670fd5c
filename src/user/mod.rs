mod repository;
mod service;
mod setting;

pub use repository::*;
pub use service::*;
pub use setting::*;

use chrono::{DateTime, Utc};

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::Result;

/// User as saved on database.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Messaging-platform identifier.
    pub telegram_id: i64,
    /// Argon2id PHC string.
    pub password: String,
    /// Base64 PKCS#1 public key.
    pub public_key: String,
    /// Private key sealed under the user password.
    pub private_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::decode(&self.public_key)?)
    }

    /// Unseal the private key. Requires the plaintext password.
    pub fn private_key(&self, password: &str) -> Result<PrivateKey> {
        Ok(PrivateKey::open(&self.private_key, password)?)
    }
}
