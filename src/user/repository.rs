//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::user::User;

/// Storage of [`User`] records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert [`User`], returning it with its generated fields.
    async fn insert(&self, user: &User) -> Result<User>;

    /// Find a live user by messaging-platform identifier.
    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>>;
}

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    /// Create a new [`PostgresUserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: &User) -> Result<User> {
        let result = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (telegram_id, password, public_key, private_key)
                VALUES ($1, $2, $3, $4)
                RETURNING *"#,
        )
        .bind(user.telegram_id)
        .bind(&user.password)
        .bind(&user.public_key)
        .bind(&user.private_key)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(ServerError::UserExists(user.telegram_id))
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT * FROM users WHERE telegram_id = $1 AND deleted_at IS NULL"#,
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
