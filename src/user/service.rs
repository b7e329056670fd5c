use std::sync::Arc;

use crate::crypto::{Crypto, CryptoError, KeyPair};
use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    pub repo: Arc<dyn UserRepository>,
    pub crypto: Arc<Crypto>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(repo: Arc<dyn UserRepository>, crypto: Arc<Crypto>) -> Self {
        Self { repo, crypto }
    }

    /// Create a user.
    ///
    /// Hash password, generate a key pair and seal its private half under
    /// the plaintext password.
    pub async fn create(&self, telegram_id: i64, password: &str) -> Result<User> {
        if self.repo.find_by_telegram_id(telegram_id).await?.is_some() {
            return Err(ServerError::UserExists(telegram_id));
        }

        let crypto = Arc::clone(&self.crypto);
        let password = password.to_owned();
        let user = tokio::task::spawn_blocking(move || -> Result<User> {
            let hash = crypto.pwd.hash_password(&password)?;
            let pair = KeyPair::generate(crypto.rsa_bits)?;

            Ok(User {
                telegram_id,
                password: hash,
                public_key: pair.public_key.encode()?,
                private_key: pair.private_key.seal(&password)?,
                ..Default::default()
            })
        })
        .await
        .map_err(ServerError::internal)??;

        let user = self.repo.insert(&user).await?;
        tracing::info!(user_id = user.id, "user created");

        Ok(user)
    }

    /// Find current user using messaging-platform identifier.
    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        self.repo.find_by_telegram_id(telegram_id).await
    }

    /// Check `password` against the stored hash.
    pub async fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        let crypto = Arc::clone(&self.crypto);
        let hash = user.password.clone();
        let password = password.to_owned();

        let result = tokio::task::spawn_blocking(move || {
            crypto.pwd.verify_password(password, &hash)
        })
        .await
        .map_err(ServerError::internal)?;

        match result {
            Ok(()) => Ok(true),
            Err(CryptoError::InvalidPassword) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
